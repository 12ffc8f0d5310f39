//! Build and teardown pipelines

use crate::action::{ActionType, Plan, RunReport, StepOutcome};
use crate::error::{CloudError, Result};
use crate::provisioner::{CreateContext, Provisioner, ResourceKind};
use dwhflow_config::{ConfigError, ConfigStore, StateFile, StateLock, Template, schema, section};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

/// Runs provisioners in dependency order against one configuration file
///
/// The file is the idempotency oracle: a family whose identifier fields are
/// all recorded is skipped by the build, a family with none recorded is
/// skipped by the teardown. Every pipeline holds a [`StateLock`] on the file.
pub struct Orchestrator {
    config_path: PathBuf,
    template: Template,
    provisioners: Vec<Box<dyn Provisioner>>,
}

impl Orchestrator {
    pub fn new(
        config_path: impl Into<PathBuf>,
        template: Template,
        provisioners: Vec<Box<dyn Provisioner>>,
    ) -> Self {
        Self {
            config_path: config_path.into(),
            template,
            provisioners,
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Create every family in build order, starting from the template if the
    /// file does not exist yet. Stops at the first failing step.
    pub async fn build_all(&self, profile: &str, password: &str) -> Result<RunReport> {
        let started = Instant::now();
        let _lock = StateLock::acquire(&self.config_path)?;

        let template = self
            .template
            .clone()
            .with_value(section::DEFAULT, "admin_profile", profile);
        let (mut state, created) = StateFile::open_or_init(&self.config_path, &template)?;
        if !created {
            let recorded = schema::admin_profile(state.store())?;
            if recorded != profile {
                warn!(
                    "Configuration already uses profile '{}', ignoring '{}'",
                    recorded, profile
                );
            }
        }

        let ctx = CreateContext::with_password(password);
        let mut report = RunReport::new();
        for kind in ResourceKind::BUILD_ORDER {
            report.push(self.create_step(&mut state, kind, &ctx).await?);
        }
        report.duration_ms = started.elapsed().as_millis() as u64;
        Ok(report)
    }

    /// Delete every family in teardown order. Stops at the first failing step.
    pub async fn teardown_all(&self) -> Result<RunReport> {
        let started = Instant::now();
        let _lock = StateLock::acquire(&self.config_path)?;
        let mut state = StateFile::open(&self.config_path)?;

        let mut report = RunReport::new();
        for kind in ResourceKind::TEARDOWN_ORDER {
            report.push(self.delete_step(&mut state, kind).await?);
        }
        report.duration_ms = started.elapsed().as_millis() as u64;
        Ok(report)
    }

    /// Create a single family. The file must already exist.
    pub async fn create(&self, kind: ResourceKind, ctx: &CreateContext) -> Result<StepOutcome> {
        let _lock = StateLock::acquire(&self.config_path)?;
        let mut state = StateFile::open(&self.config_path)?;
        self.create_step(&mut state, kind, ctx).await
    }

    /// Delete a single family. The file must already exist.
    pub async fn delete(&self, kind: ResourceKind) -> Result<StepOutcome> {
        let _lock = StateLock::acquire(&self.config_path)?;
        let mut state = StateFile::open(&self.config_path)?;
        self.delete_step(&mut state, kind).await
    }

    /// What `build_all` would do, without remote calls
    pub fn plan_build(&self) -> Result<Plan> {
        match StateFile::open(&self.config_path) {
            Ok(state) => Ok(Plan::for_build(state.store())),
            Err(ConfigError::NotFound { .. }) => {
                let store = ConfigStore::from_template(&self.template);
                Ok(Plan::for_build(&store))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// What `teardown_all` would do, without remote calls
    pub fn plan_teardown(&self) -> Result<Plan> {
        let state = StateFile::open(&self.config_path)?;
        Ok(Plan::for_teardown(state.store()))
    }

    fn provisioner(&self, kind: ResourceKind) -> Result<&dyn Provisioner> {
        self.provisioners
            .iter()
            .find(|p| p.kind() == kind)
            .map(|p| p.as_ref())
            .ok_or_else(|| CloudError::Precondition(format!("no provisioner for {}", kind)))
    }

    async fn create_step(
        &self,
        state: &mut StateFile,
        kind: ResourceKind,
        ctx: &CreateContext,
    ) -> Result<StepOutcome> {
        if kind.is_provisioned(state.store()) {
            let message = format!("{} already exists", kind.display_name());
            info!("{}, skipping", message);
            return Ok(StepOutcome {
                kind,
                action: ActionType::NoOp,
                message,
            });
        }

        info!("Creating {}", kind.display_name());
        self.provisioner(kind)?.create(state, ctx).await?;
        state.save()?;
        Ok(StepOutcome {
            kind,
            action: ActionType::Create,
            message: format!("{} created", kind.display_name()),
        })
    }

    async fn delete_step(&self, state: &mut StateFile, kind: ResourceKind) -> Result<StepOutcome> {
        if kind.is_absent(state.store()) {
            let message = format!("{} does not exist", kind.display_name());
            info!("{}, skipping", message);
            return Ok(StepOutcome {
                kind,
                action: ActionType::NoOp,
                message,
            });
        }

        info!("Deleting {}", kind.display_name());
        self.provisioner(kind)?.delete(state).await?;
        state.save()?;
        Ok(StepOutcome {
            kind,
            action: ActionType::Delete,
            message: format!("{} deleted", kind.display_name()),
        })
    }
}
