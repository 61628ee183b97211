//! Instance selection for multi-instance operations

use crate::error::{FleetError, Result};
use convoy_cloud::Instance;

/// Which tracked instances an operation applies to.
///
/// `All` means every instance the manager currently tracks. An explicit
/// selection must be non-empty and every id must be tracked; an unknown id
/// is a programming error and fails before any side effect.
#[derive(Debug, Clone, Default)]
pub enum Target {
    #[default]
    All,
    Instances(Vec<String>),
}

impl Target {
    /// Select a set of instance ids
    pub fn instances<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Target::Instances(ids.into_iter().map(Into::into).collect())
    }

    /// Resolve the selection against the tracked collection, in tracked
    /// order for `All` and caller order for an explicit selection.
    pub(crate) fn resolve(&self, tracked: &[Instance]) -> Result<Vec<String>> {
        match self {
            Target::All => Ok(tracked.iter().map(|instance| instance.id.clone()).collect()),
            Target::Instances(ids) => {
                if ids.is_empty() {
                    return Err(FleetError::EmptyTarget);
                }
                for id in ids {
                    if !tracked.iter().any(|instance| &instance.id == id) {
                        return Err(FleetError::UnknownInstance(id.clone()));
                    }
                }
                Ok(ids.clone())
            }
        }
    }
}

impl From<&Instance> for Target {
    fn from(instance: &Instance) -> Self {
        Target::Instances(vec![instance.id.clone()])
    }
}

impl From<&[Instance]> for Target {
    fn from(instances: &[Instance]) -> Self {
        Target::Instances(instances.iter().map(|i| i.id.clone()).collect())
    }
}
