mod bootstrap;
mod demo_world;
mod loop_runner;
mod metrics;
mod raster;
mod session;

pub(crate) use bootstrap::build_app;
pub(crate) use loop_runner::run;
