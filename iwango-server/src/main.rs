//! Binary entrypoint: load configuration, bind every port, and run until a
//! shutdown signal arrives. All the actual work lives in [`supervisor::run`];
//! this file only has to turn a startup failure into a process exit code.

use iwango_server::supervisor;

#[tokio::main]
async fn main() {
    if let Err(err) = supervisor::run().await {
        eprintln!("iwango-server: {err}");
        std::process::exit(1);
    }
}
