// Lambda binary for the load stage
//
// Build with: cargo build -p accidents2pg-lambda --bin loader

#[tokio::main]
async fn main() -> Result<(), lambda_runtime::Error> {
    accidents2pg_lambda::run_loader().await
}
