pub mod apply;
pub mod destroy;
pub mod outputs;
pub mod plan;
pub mod replace;
pub mod validate;

use colored::Colorize;
use stackflow_cloud::{
    ApplyOptions, CancellationToken, ControlPlane, ControlPlaneRouter, Executor, ResourceKind,
    SandboxControlPlane, StateLock,
};
use stackflow_cloud_cloudflare::{CloudflareDnsControlPlane, DnsConfig};
use stackflow_core::LoadedStack;
use std::path::PathBuf;
use std::sync::Arc;

/// The loaded stack and the control planes it converges against
pub struct Workspace {
    pub stack_file: PathBuf,
    pub stack: LoadedStack,
    pub sandbox: Arc<SandboxControlPlane>,
    pub control_plane: Arc<dyn ControlPlane>,
}

impl Workspace {
    /// Find the stack file, build its topology and open the sandbox
    pub async fn open() -> anyhow::Result<Self> {
        let stack_file = stackflow_config::find_stack_file()?;
        let project_root = stackflow_config::project_root(&stack_file);
        let stack = stackflow_core::load_stack(&stack_file)?;

        let sandbox = Arc::new(SandboxControlPlane::open(&project_root).await?);
        let mut router = ControlPlaneRouter::new(sandbox.clone());
        if DnsConfig::is_configured() {
            let dns = CloudflareDnsControlPlane::from_env()?;
            tracing::info!(zone = dns.dns().domain(), "Routing DNS records to Cloudflare");
            router = router.route(ResourceKind::DnsRecord, Arc::new(dns));
        }

        Ok(Self {
            stack_file,
            stack,
            sandbox,
            control_plane: Arc::new(router),
        })
    }

    pub fn executor(&self, options: ApplyOptions) -> Executor {
        Executor::new(self.control_plane.clone(), options)
    }

    /// Lock the sandbox for a mutating command
    pub async fn lock(&self) -> anyhow::Result<StateLock> {
        Ok(self.sandbox.lock().await?)
    }

    pub fn print_header(&self, action: &str) {
        println!(
            "{} {} ({})",
            action.blue().bold(),
            self.stack.spec.project.cyan(),
            self.stack_file.display()
        );
    }
}

/// Token cancelled on Ctrl-C
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("{}", "Interrupted, stopping after in-flight operations...".yellow());
            trigger.cancel();
        }
    });
    token
}
