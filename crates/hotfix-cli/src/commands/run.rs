//! `hotfix run`: load packed artifacts from disk and enter the module.

use hotfix_engine::{NativeCallResult, NativeFunctionRegistry};
use hotfix_runtime::{bootstrap, HotfixConfig, HotfixHost, NoCatalog, StaticConfigurator};
use std::sync::Arc;
use termcolor::ColorChoice;
use tracing::info;

use crate::output::StyledOutput;

/// Host functions available to modules run from the command line
fn demo_natives() -> NativeFunctionRegistry {
    let mut natives = NativeFunctionRegistry::new();
    natives.register("host.enter", |call, args| {
        let scene = args.first().and_then(|v| v.as_str()).unwrap_or_default();
        info!(target: "hotfix::module", method = call.method_name, scene, "entered");
        NativeCallResult::null()
    });
    natives.register("host.log", |call, args| {
        let message = args
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        info!(target: "hotfix::module", from = call.type_name, "{}", message);
        NativeCallResult::null()
    });
    natives
}

pub fn execute(
    config: HotfixConfig,
    entry_argument: String,
    serve: bool,
    color: ColorChoice,
) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run(config, entry_argument, serve, color))
}

async fn run(
    config: HotfixConfig,
    entry_argument: String,
    serve: bool,
    color: ColorChoice,
) -> anyhow::Result<()> {
    let host = HotfixHost::builder(config)
        .configurator(Arc::new(StaticConfigurator::new(entry_argument)))
        .natives(demo_natives())
        .build()?;

    let mut out = StyledOutput::new(color);
    if let Err(e) = bootstrap::start(&host, &NoCatalog).await {
        out.error("error");
        out.plain(&format!(": {}", e));
        out.newline();
        out.flush();
        return Err(e.into());
    }

    out.success("Loaded");
    out.newline();
    out.field("state", &format!("{:?}", host.state()));
    out.field("behaviours", &host.behaviours().list().join(", "));
    if let Some(addr) = host.debug_bridge_addr() {
        out.field("debugger", &addr.to_string());
    }
    out.flush();

    if serve {
        out.dim("Serving until Ctrl-C");
        out.newline();
        out.flush();
        tokio::signal::ctrl_c().await?;
    }
    host.dispose();
    Ok(())
}
