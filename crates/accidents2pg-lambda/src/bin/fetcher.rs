// Lambda binary for the fetch stage
//
// Build with: cargo build -p accidents2pg-lambda --bin fetcher

#[tokio::main]
async fn main() -> Result<(), lambda_runtime::Error> {
    accidents2pg_lambda::run_fetcher().await
}
