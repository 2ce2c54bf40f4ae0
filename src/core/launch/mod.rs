pub mod arguments;
pub mod classpath;
pub mod natives;
pub mod task;

pub use arguments::{CommandBuilder, LaunchPlan, LaunchRequest};
pub use classpath::{
    build_classpath, classpath_separator, join_classpath, DependencyResolver, PartialFailure,
    Resolution,
};
pub use natives::stage_natives;
pub use task::{ProcessState, ProcessSupervisor, RunningInstance, DEFAULT_EARLY_EXIT_GRACE};
