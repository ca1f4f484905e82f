use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use sea_orm::{Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use tracing::info;

use bazaar_auth::config::AuthConfig;
use bazaar_auth::domain::port::Clock;
use bazaar_auth::infra::db::{DbTokenRepository, DbUserRepository, DbVerificationCodeRepository};
use bazaar_auth::infra::hasher::Argon2PasswordHasher;
use bazaar_auth::infra::sms::HttpSmsGateway;
use bazaar_auth::infra::system::{OsSecretSource, SystemClock};
use bazaar_auth::router::build_router;
use bazaar_auth::state::AppState;
use bazaar_auth::usecase::admin::{CreateAdminInput, CreateAdminUseCase};
use bazaar_auth::usecase::cleanup::CleanupUseCase;
use bazaar_auth_migration::Migrator;
use bazaar_core::tracing::init_tracing;
use bazaar_domain::phone::format_display;

#[derive(Parser)]
#[command(name = "auth", about = "Bazaar phone OTP authentication service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default).
    Serve,
    /// Apply pending schema migrations, then exit.
    Migrate,
    /// Delete expired codes, sessions and refresh tokens once, then exit.
    Cleanup,
    /// Create a back-office account that signs in with email + password.
    CreateAdmin {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        first_name: Option<String>,
    },
}

fn cleanup_usecase(
    db: &DatabaseConnection,
    clock: Arc<dyn Clock>,
) -> CleanupUseCase<DbVerificationCodeRepository, DbTokenRepository> {
    CleanupUseCase {
        codes: DbVerificationCodeRepository { db: db.clone() },
        tokens: DbTokenRepository { db: db.clone() },
        clock,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = AuthConfig::from_env();
    init_tracing(config.log_format);

    let db = Database::connect(&config.database_url)
        .await
        .expect("failed to connect to database");
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, db, clock).await,
        Command::Migrate => {
            Migrator::up(&db, None).await.expect("migration failed");
            info!("migrations applied");
        }
        Command::Cleanup => {
            let report = cleanup_usecase(&db, clock)
                .execute()
                .await
                .expect("cleanup failed");
            println!(
                "removed {} verification codes, {} sessions, {} refresh tokens",
                report.verification_codes, report.sessions, report.refresh_tokens
            );
        }
        Command::CreateAdmin {
            email,
            password,
            phone,
            first_name,
        } => {
            let usecase = CreateAdminUseCase {
                users: DbUserRepository { db },
                hasher: Arc::new(Argon2PasswordHasher),
                clock,
            };
            let admin = usecase
                .execute(CreateAdminInput {
                    email,
                    password,
                    phone,
                    first_name,
                })
                .await
                .expect("failed to create admin");
            match admin.phone.as_deref() {
                Some(phone) => println!("created admin {} ({})", admin.id, format_display(phone)),
                None => println!("created admin {}", admin.id),
            }
        }
    }
}

async fn serve(config: AuthConfig, db: DatabaseConnection, clock: Arc<dyn Clock>) {
    let gateway = HttpSmsGateway::new(&config.sms).expect("failed to build SMS client");
    if config.sms.test_mode {
        info!("sms test mode enabled, messages are not sent");
    }

    if config.cleanup_interval_secs > 0 {
        let job = cleanup_usecase(&db, Arc::clone(&clock));
        tokio::spawn(job.run_periodically(Duration::from_secs(config.cleanup_interval_secs)));
    }

    let state = AppState {
        db,
        gateway: Arc::new(gateway),
        clock,
        secrets: Arc::new(OsSecretSource::new(config.jwt_secret)),
        hasher: Arc::new(Argon2PasswordHasher),
        otp: config.otp,
        tokens: config.tokens,
        sms: config.sms,
    };

    let router = build_router(state);
    let addr = format!("0.0.0.0:{}", config.auth_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind");

    info!("auth service listening on {addr}");
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("server error");
}
