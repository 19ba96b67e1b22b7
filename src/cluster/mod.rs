// ABOUTME: Trait seams for the external compute cluster and load balancer.
// ABOUTME: Defines Scheduler and LoadBalancer plus their HTTP implementations.

mod balancer;
mod http;
mod scheduler;

pub use balancer::{BalancerError, DrainState, LoadBalancer};
pub use http::{HttpBalancer, HttpScheduler};
pub use scheduler::{LaunchedTask, ScheduleError, Scheduler, TaskRunState, TaskSpec};
