use async_trait::async_trait;

/// Runtime side of a plugin module.
///
/// Which capability interfaces a module provides is declared in its
/// [`ModuleDescriptor`](crate::ModuleDescriptor), not through this trait;
/// the host only drives the lifecycle hooks.
#[async_trait]
pub trait Module: Send + Sync + 'static {
    /// Called once, after every dependency finished its own init.
    ///
    /// Returning an error disables the module for this run. Dependencies that
    /// failed at runtime are not reported here: use
    /// [`ModuleCtx::capabilities`](crate::ModuleCtx::capabilities) to detect
    /// them and degrade gracefully.
    async fn init(&self, ctx: &crate::context::ModuleCtx) -> anyhow::Result<()>;

    /// Called at teardown, in reverse activation order.
    async fn shutdown(&self) -> anyhow::Result<()> {
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any;
}
