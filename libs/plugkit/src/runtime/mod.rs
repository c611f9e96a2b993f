mod host;
mod lifecycle;
mod runner;
mod shutdown;

pub use host::{
    ActivationSource, DisableCause, DisabledModule, HostError, HostSnapshot, ModuleHost,
    ModuleHostBuilder, Plan,
};
pub use lifecycle::{ActivationOutcome, LifecycleManager, LoaderOptions, RuntimeFailure};
pub use runner::{run, RunOptions, ShutdownOptions};
pub use shutdown::wait_for_shutdown;
