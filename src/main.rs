//! The autoscaler binary entrypoint

use std::sync::Arc;

use clap::Parser;
use fleet_autoscaler::args::Args;
use fleet_autoscaler::collaborators::http::{HttpAgentManagement, HttpJobOperations, HttpSchedulingService};
use fleet_autoscaler::config::Conf;
use fleet_autoscaler::{trace, AutoscalerLoop};

#[tokio::main]
async fn main() {
    let args = Args::parse();
    trace::setup("fleet-autoscaler");

    let conf = Conf::new(&args.config).expect("Failed to load config");

    let agent_management = HttpAgentManagement::new(&conf.autoscaler.agent_management)
        .expect("Failed to build agent management client");
    let scheduling_service = HttpSchedulingService::new(&conf.autoscaler.scheduling_service)
        .expect("Failed to build scheduling service client");
    let job_operations = HttpJobOperations::new(&conf.autoscaler.job_operations)
        .expect("Failed to build job operations client");

    let mut autoscaler = AutoscalerLoop::new(
        conf.autoscaler,
        Arc::new(agent_management),
        Arc::new(scheduling_service),
        Arc::new(job_operations),
    );

    if args.dry_run {
        tracing::info!("dry_run set; running a single evaluation and exiting");
        if let Err(error) = autoscaler.run_iteration().await {
            tracing::error!(%error, "dry run evaluation failed");
        }
        return;
    }

    autoscaler.start().await;
}
