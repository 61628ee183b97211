//! Scoped fleet execution with guaranteed teardown

use crate::config::FleetConfig;
use crate::error::{FleetError, Result};
use crate::manager::FleetManager;

/// Run `body` with a freshly built [`FleetManager`] and tear the fleet down
/// afterwards, whether the body returned, failed, or was interrupted by
/// Ctrl-C. The body's result (or [`FleetError::Interrupted`]) is returned
/// after cleanup finishes.
///
/// ```no_run
/// use convoy::{run_scoped, FleetConfig, Target, DEFAULT_CONNECT_ATTEMPTS};
///
/// # async fn demo() -> convoy::Result<()> {
/// let config = FleetConfig {
///     key_name: "my-key".to_string(),
///     instance_count: 2,
///     ..FleetConfig::default()
/// };
/// run_scoped(config, async |fleet| {
///     fleet.create_instances(true).await?;
///     fleet
///         .connect_to_instances(Target::All, DEFAULT_CONNECT_ATTEMPTS, None)
///         .await?;
///     fleet.execute_command("uname -a", Target::All)?;
///     Ok(())
/// })
/// .await
/// # }
/// ```
pub async fn run_scoped<T, F>(config: FleetConfig, body: F) -> Result<T>
where
    F: AsyncFnOnce(&mut FleetManager) -> Result<T>,
{
    let manager = FleetManager::new(config).await?;
    run_scoped_with(manager, body).await
}

/// Like [`run_scoped`], but for a manager the caller already built. Useful
/// when the provider or connector is customized.
pub async fn run_scoped_with<T, F>(mut manager: FleetManager, body: F) -> Result<T>
where
    F: AsyncFnOnce(&mut FleetManager) -> Result<T>,
{
    let outcome = {
        let work = body(&mut manager);
        tokio::pin!(work);
        tokio::select! {
            result = &mut work => result,
            signal = tokio::signal::ctrl_c() => match signal {
                Ok(()) => {
                    tracing::warn!("interrupt received, tearing the fleet down");
                    Err(FleetError::Interrupted)
                }
                Err(err) => Err(FleetError::Io(err)),
            },
        }
    };

    manager.cleanup().await;
    outcome
}
