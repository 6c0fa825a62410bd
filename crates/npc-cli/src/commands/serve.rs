use std::sync::Arc;

use npc_config::NpcConfig;
use npc_server::AppState;
use tracing::{info, warn};

pub(super) async fn cmd_serve(
    mut config: NpcConfig,
    listen: Option<String>,
) -> npc_core::Result<()> {
    if let Some(listen) = listen {
        config.server.listen = listen;
    }

    match config.validate() {
        Ok(warnings) => {
            for w in warnings {
                warn!("{w}");
            }
        }
        Err(e) => return Err(npc_core::NpcError::Config(e)),
    }

    let provider = npc_llm::new_provider(&config.llm)?;
    println!("npcd v{}", env!("CARGO_PKG_VERSION"));
    println!("   Provider: {}", provider.name());
    println!("   Model: {}", provider.model());
    match &config.server.socket_path {
        Some(path) => println!("   Socket: {}", path.display()),
        None => println!("   Listen: http://{}", config.server.listen),
    }
    println!();

    let state = Arc::new(AppState::build(provider, &config)?);
    let sessions = state.sessions.clone();

    let shutdown = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("shutdown signal received"),
            Err(e) => {
                warn!(error = %e, "failed to listen for ctrl-c, serving until killed");
                std::future::pending::<()>().await;
            }
        }
    };

    let served = npc_server::start_server(state, &config.server, shutdown).await;
    sessions.shutdown();
    served
}
