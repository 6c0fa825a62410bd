//! Prompt rendering: the persona system prompt and the XML-like user turn.

use npc_core::{KnowledgeGraph, Npc, NpcError, Perception, Result, Surrounding, TickEvent};
use serde::Serialize;

/// Persona instructions for `npc`. The name and background are substituted
/// in one pass, so braces inside either are kept literally.
pub fn system_prompt(npc: &Npc) -> String {
    format!(
        "You are playing the role of {name}, a character in a video game.

Background: {background}

IMPORTANT INSTRUCTIONS:
1. All internal reasoning, planning, and decision-making MUST be enclosed in <thinking></thinking> tags.
2. Anything outside of <thinking> tags will be interpreted as either:
   - Your character speaking (dialogue that other characters can hear)
   - Tool calls (if tools are provided)
3. Do NOT include any meta-commentary, stage directions, or actions outside of thinking tags unless they are tool calls.
4. Stay in character at all times when speaking.

Example format:
<thinking>
I need to analyze the situation. The player seems friendly, so I should greet them.
</thinking>
Hello there, traveler! Welcome to our village.

Remember: Only use <thinking> tags for internal thoughts. Everything else is either speech or tool use.",
        name = npc.name,
        background = npc.background_story,
    )
}

pub fn render_surroundings(surroundings: &[Surrounding]) -> String {
    let mut out = String::from("<surroundings>\n");
    for s in surroundings {
        out.push_str(&format!(
            "\t<surrounding>\n\t\t<surrounding_name>{}</surrounding_name>\n\t\t<surrounding_description>{}</surrounding_description>\n\t</surrounding>\n",
            s.name, s.description
        ));
    }
    out.push_str("</surroundings>");
    out
}

fn to_json(value: &impl Serialize) -> Result<String> {
    serde_json::to_string(value).map_err(|e| NpcError::Render {
        section: "knowledge_graph".into(),
        reason: e.to_string(),
    })
}

/// The graph is only rendered when `depth > 0`; otherwise an empty section.
pub fn render_knowledge_graph(graph: &KnowledgeGraph, depth: u32) -> Result<String> {
    if depth == 0 {
        return Ok("<knowledge_graph></knowledge_graph>".to_string());
    }

    let mut out = String::from("<knowledge_graph>\n\t<nodes>\n");
    for node in &graph.nodes {
        out.push_str(&format!(
            "\t\t<node>\n\t\t\t<node_id>{}</node_id>\n\t\t\t<node_data>{}</node_data>\n\t\t</node>\n",
            node.id,
            to_json(&node.data)?
        ));
    }
    out.push_str("\t</nodes>\n\t<edges>\n");
    for edge in &graph.edges {
        out.push_str(&format!(
            "\t\t<edge>\n\t\t\t<edge_source>{}</edge_source>\n\t\t\t<edge_target>{}</edge_target>\n\t\t\t<edge_data>{}</edge_data>\n\t\t</edge>\n",
            edge.source,
            edge.target,
            to_json(&edge.data)?
        ));
    }
    out.push_str("\t</edges>\n</knowledge_graph>");
    Ok(out)
}

pub fn render_events(events: &[TickEvent]) -> String {
    if events.is_empty() {
        return "<events_since_last_tick></events_since_last_tick>".to_string();
    }

    let mut out = String::from("<events_since_last_tick>\n");
    for e in events {
        out.push_str(&format!(
            "\t<event>\n\t\t<event_type>{}</event_type>\n\t\t<event_description>{}</event_description>\n\t</event>\n",
            e.event_type, e.event_description
        ));
    }
    out.push_str("</events_since_last_tick>");
    out
}

/// The user turn: surroundings, knowledge graph and events, newline-separated.
pub fn render_user_prompt(perception: &Perception) -> Result<String> {
    let surroundings = render_surroundings(&perception.surroundings);
    let graph = render_knowledge_graph(
        &perception.knowledge_graph,
        perception.knowledge_graph_depth,
    )?;
    let events = render_events(&perception.events);
    Ok(format!("{surroundings}\n{graph}\n{events}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use npc_core::{Edge, Node};
    use serde_json::json;

    #[test]
    fn test_system_prompt_mentions_persona() {
        let prompt = system_prompt(&Npc::new("Elara", "A wandering herbalist."));
        assert!(prompt.starts_with("You are playing the role of Elara, a character"));
        assert!(prompt.contains("Background: A wandering herbalist."));
        assert!(!prompt.contains("{name}"));
    }

    #[test]
    fn test_system_prompt_keeps_placeholders_in_name_literal() {
        let prompt = system_prompt(&Npc::new("{background}", "A smith."));
        assert!(prompt.starts_with("You are playing the role of {background}, a character"));
        assert!(prompt.contains("Background: A smith."));
    }

    #[test]
    fn test_surroundings() {
        let out = render_surroundings(&[Surrounding::new("Well", "An old stone well")]);
        assert_eq!(
            out,
            "<surroundings>\n\t<surrounding>\n\t\t<surrounding_name>Well</surrounding_name>\n\t\t<surrounding_description>An old stone well</surrounding_description>\n\t</surrounding>\n</surroundings>"
        );
        assert_eq!(render_surroundings(&[]), "<surroundings>\n</surroundings>");
    }

    #[test]
    fn test_knowledge_graph_depth_zero_is_empty() {
        let graph = KnowledgeGraph {
            nodes: vec![Node {
                id: "n1".into(),
                data: Default::default(),
            }],
            edges: vec![],
        };
        assert_eq!(
            render_knowledge_graph(&graph, 0).unwrap(),
            "<knowledge_graph></knowledge_graph>"
        );
    }

    #[test]
    fn test_knowledge_graph_rendered_as_json() {
        let data = json!({"kind": "person"}).as_object().cloned().unwrap();
        let graph = KnowledgeGraph {
            nodes: vec![Node {
                id: "elara".into(),
                data: data.clone(),
            }],
            edges: vec![Edge {
                source: "elara".into(),
                target: "village".into(),
                data,
            }],
        };
        let out = render_knowledge_graph(&graph, 1).unwrap();
        assert!(out.contains("<node_id>elara</node_id>"));
        assert!(out.contains(r#"<node_data>{"kind":"person"}</node_data>"#));
        assert!(out.contains("<edge_target>village</edge_target>"));
        assert!(out.ends_with("\t</edges>\n</knowledge_graph>"));
    }

    #[test]
    fn test_events() {
        assert_eq!(
            render_events(&[]),
            "<events_since_last_tick></events_since_last_tick>"
        );
        let out = render_events(&[TickEvent::new("sound", "A bell rings")]);
        assert!(out.contains("<event_type>sound</event_type>"));
        assert!(out.contains("<event_description>A bell rings</event_description>"));
    }

    #[test]
    fn test_user_prompt_joins_sections() {
        let out = render_user_prompt(&Perception::default()).unwrap();
        assert_eq!(
            out,
            "<surroundings>\n</surroundings>\n<knowledge_graph></knowledge_graph>\n<events_since_last_tick></events_since_last_tick>"
        );
    }
}
