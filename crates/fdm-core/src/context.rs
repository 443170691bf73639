use fdm_model::{BuildConfig, TableConfig};
use fdm_store::{RelationalStore, SubjectRegistry};

static UNCONFIGURED: TableConfig = TableConfig {
    source: None,
    identifier_alias: None,
    event_start: None,
    event_end: None,
    fresh_copy: false,
};

/// Store, registry and configuration shared by every build step.
#[derive(Clone, Copy)]
pub struct BuildContext<'a> {
    pub store: &'a dyn RelationalStore,
    pub registry: &'a dyn SubjectRegistry,
    pub config: &'a BuildConfig,
}

impl<'a> BuildContext<'a> {
    pub fn new(
        store: &'a dyn RelationalStore,
        registry: &'a dyn SubjectRegistry,
        config: &'a BuildConfig,
    ) -> Self {
        Self {
            store,
            registry,
            config,
        }
    }

    /// Configuration of `table`, or an empty one.
    pub fn table_config(&self, table: &str) -> &'a TableConfig {
        self.config.table(table).unwrap_or(&UNCONFIGURED)
    }
}
