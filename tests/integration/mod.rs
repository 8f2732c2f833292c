//! Integration tests for the notebook refresh scheduler


mod auto_refresh;
mod config_loading;
mod pipeline_scenarios;
mod submit;
mod worker_lifecycle;
