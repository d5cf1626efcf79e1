use portal_notify::server::cli::{execute_command, portal_commands};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let matches = portal_commands().get_matches();
    execute_command(&matches).await
}
