use crate::profiling::ProfilingBackend;

/// Process-wide configuration for Tessera tools and demos.
#[derive(Debug)]
pub struct Config {
    pub profiling: ProfilingMode,
    /// Filter directive handed to the log subscriber. `None` uses the default.
    pub log_filter: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            profiling: ProfilingMode::Off,
            log_filter: None,
        }
    }
}

impl Config {
    /// Install logging and profiling according to this configuration.
    pub fn apply(&self) {
        match &self.log_filter {
            Some(filter) => {
                crate::logging::try_init_with_filter(filter);
            }
            None => {
                crate::logging::try_init_with_filter(crate::logging::DEFAULT_FILTER);
            }
        }

        if let Some(backend) = self.profiling.backend() {
            crate::profiling::init_profiling(backend);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfilingMode {
    /// Profiling is disabled
    Off,
    /// Scopes are recorded in-process only
    On,
    /// Scopes are recorded and served to 'puffin_viewer'
    #[cfg(feature = "profiling")]
    WithWebserver,
}

impl ProfilingMode {
    fn backend(self) -> Option<ProfilingBackend> {
        match self {
            ProfilingMode::Off => None,
            ProfilingMode::On => Some(ProfilingBackend::InProcess),
            #[cfg(feature = "profiling")]
            ProfilingMode::WithWebserver => Some(ProfilingBackend::PuffinHttp),
        }
    }
}
