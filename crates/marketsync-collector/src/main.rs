//! MarketSync sync engine CLI.

use clap::{Parser, Subcommand};
use marketsync_collector::config::split_subjects;
use marketsync_collector::modules::{run_sync, CancelFlag, SyncContext, SyncOptions};
use marketsync_collector::{CollectorConfig, CollectorError};
use marketsync_core::DailyBar;
use marketsync_data::cache::{DurableTier, RedisTier, RedisTierConfig, TieredCache};
use marketsync_data::source::{HttpDataSource, HttpSourceConfig};
use marketsync_data::storage::{PgStore, PgStoreConfig};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "marketsync-collector")]
#[command(about = "MarketSync Data Sync Engine", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// 일봉 데이터 동기화 (1회 실행)
    Sync {
        /// 특정 subject만 동기화 (쉼표로 구분, 예: "005930,000660")
        #[arg(long)]
        subjects: Option<String>,

        /// 최신 상태인 subject도 전체 기간 재수집
        #[arg(long)]
        force_full: bool,
    },

    /// 데몬 모드: 주기적으로 동기화 실행
    Daemon,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // 로깅 초기화
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "marketsync_collector={level},marketsync_data={level}",
                    level = cli.log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("MarketSync Collector 시작");

    // 설정 로드
    let config = CollectorConfig::from_env()?;
    tracing::debug!(source_base_url = %config.source_base_url, "설정 로드 완료");

    // 영구 저장소 연결
    let store = PgStore::connect(&PgStoreConfig {
        url: config.database_url.clone(),
        ..Default::default()
    })
    .await?;
    store.ensure_schema().await?;

    // 캐시. Redis가 없거나 죽어 있으면 휘발 계층만 씁니다
    let cache = build_cache(config.redis_url.as_deref()).await;

    let source = HttpDataSource::new(&HttpSourceConfig {
        base_url: config.source_base_url.clone(),
        timeout: config.sync.fetch_timeout(),
    })?;

    // Ctrl-C는 즉시 죽이지 않고 취소 신호만 보냅니다. 진행 중인 작업은
    // 마무리되고 버퍼는 정상 경로로 flush됩니다
    let cancel = CancelFlag::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("종료 신호 수신, 진행 중인 작업만 마무리합니다");
                cancel.cancel();
            }
        });
    }

    let ctx = SyncContext {
        source: Arc::new(source),
        store: Arc::new(store),
        cache,
        limiter_config: config.sync.limiter_config(),
        retry_config: config.sync.retry_config(),
        cancel: cancel.clone(),
    };

    match cli.command {
        Commands::Sync {
            subjects,
            force_full,
        } => {
            let subject_list = resolve_subjects(&config, subjects);
            let options = sync_options(&config, force_full);
            run_once(&ctx, &subject_list, &options).await?;
        }
        Commands::Daemon => {
            tracing::info!(
                "=== 데몬 모드 시작 (주기: {}분) ===",
                config.daemon.interval_minutes
            );

            let subject_list = resolve_subjects(&config, None);
            let options = sync_options(&config, false);

            let mut interval = tokio::time::interval(config.daemon.interval());
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        tracing::info!("종료 신호 수신, 데몬 종료 중...");
                        break;
                    }
                    _ = interval.tick() => {
                        if let Err(e) = run_once(&ctx, &subject_list, &options).await {
                            tracing::error!("동기화 실행 실패: {}", e);
                        }

                        let removed = ctx.cache.compact().await;
                        tracing::debug!(removed, "캐시 정리 완료");

                        if cancel.is_cancelled() {
                            break;
                        }
                        tracing::info!(
                            "=== 다음 실행: {}분 후 ===",
                            config.daemon.interval_minutes
                        );
                    }
                }
            }
        }
    }

    tracing::info!("MarketSync Collector 종료");

    Ok(())
}

/// 동기화를 한 번 실행하고 요약을 로그로 남깁니다.
///
/// 마지막 flush 실패는 부분 요약을 기록한 뒤 그대로 전파합니다.
async fn run_once(
    ctx: &SyncContext,
    subjects: &[String],
    options: &SyncOptions,
) -> marketsync_collector::Result<()> {
    if subjects.is_empty() {
        tracing::warn!("동기화할 subject가 없습니다 (--subjects 또는 SYNC_SUBJECTS 설정 필요)");
        return Ok(());
    }

    match run_sync(ctx, subjects, options).await {
        Ok(run) => {
            run.log_summary("일봉 동기화");
            Ok(())
        }
        Err(CollectorError::Finalize { source, summary }) => {
            summary.log_summary("일봉 동기화 (부분 완료)");
            Err(CollectorError::Finalize { source, summary })
        }
        Err(e) => Err(e),
    }
}

/// CLI 인자가 환경변수 설정보다 우선합니다.
fn resolve_subjects(config: &CollectorConfig, cli_subjects: Option<String>) -> Vec<String> {
    match cli_subjects {
        Some(raw) => split_subjects(&raw),
        None => config.sync.subject_list(),
    }
}

fn sync_options(config: &CollectorConfig, force_full: bool) -> SyncOptions {
    SyncOptions {
        batch_size: config.sync.batch_size,
        max_workers: config.sync.max_workers,
        force_full,
        lookback_days: config.sync.lookback_days,
        fetch_timeout: config.sync.fetch_timeout(),
    }
}

async fn build_cache(redis_url: Option<&str>) -> Arc<TieredCache<Vec<DailyBar>>> {
    let durable: Option<Arc<dyn DurableTier>> = match redis_url {
        Some(url) => {
            let tier_config = RedisTierConfig {
                url: url.to_string(),
                ..Default::default()
            };
            match RedisTier::connect(&tier_config).await {
                Ok(tier) => Some(Arc::new(tier)),
                Err(e) => {
                    tracing::warn!("Redis 연결 실패, 휘발 캐시만 사용: {}", e);
                    None
                }
            }
        }
        None => {
            tracing::info!("REDIS_URL 미설정, 휘발 캐시만 사용");
            None
        }
    };

    Arc::new(TieredCache::new(durable))
}
