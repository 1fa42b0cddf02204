mod support;

mod pipeline_test;
mod pool_test;
mod resilience_test;
mod shutdown_test;
