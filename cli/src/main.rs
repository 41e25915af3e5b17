use crate::cli::{Args, Command};
use clap::Parser;
use profscope::config::CaptureConfig;
use profscope::sampling::heap::{self, HeapSamplingConfig, ProfiledAllocator};
use profscope_web::ServerConfig;
use std::alloc::System;
use tracing_subscriber::EnvFilter;

mod cli;
mod workload;

#[global_allocator]
static GLOBAL: ProfiledAllocator<System> = ProfiledAllocator::new(System);

#[tokio::main]
pub async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let matches = Args::parse();
    match matches.command {
        Command::Serve {
            bind,
            prefix,
            cors,
            default_period,
            max_period,
            frequency,
            heap_sample_rate,
            objdump,
            dot,
            workload,
        } => {
            heap::install(HeapSamplingConfig {
                sample_rate: heap_sample_rate.max(1),
                ..HeapSamplingConfig::default()
            });
            workload::spawn(workload)?;

            if default_period > max_period {
                tracing::warn!(
                    "The default period ({}s) exceeds the maximum period ({}s)",
                    default_period.as_secs_f64(),
                    max_period.as_secs_f64()
                );
            }
            let capture = CaptureConfig {
                default_period,
                max_period,
                cpu_frequency: frequency,
                ..CaptureConfig::default()
            };
            profscope_web::serve(ServerConfig {
                bind,
                prefix,
                cors,
                capture,
                objdump,
                dot,
            })
            .await
        }
    }
}
