mod apply;
mod config;
mod entry;
mod natural;
mod planner;
mod scan;
mod session;
mod template;
mod validate;

pub use apply::{apply_plan, ApplyResult, FsRenamer, RenameError, Renamer};
pub use config::{
    app_paths, load_config, load_config_from, save_config, save_config_to, AppConfig, AppPaths,
};
pub use entry::FileEntry;
pub use natural::{natural_cmp, natural_key, NaturalKey};
pub use planner::{generate_plan, NamingMode, NamingPolicy, PlanError, PlannedRename, RenamePlan};
pub use scan::{collect_files, ScanOptions, ScanStats};
pub use session::{
    BatchError, BatchOutcome, RenameSession, SortColumn, SortOrder, DEFAULT_EXTENSIONS,
};
pub use template::{render_template, validate_template, TemplateError, DEFAULT_TEMPLATE};
pub use validate::{validate_plan, ExistenceProbe, FsProbe, ValidationError};
