//! Template sync pipeline
//!
//! authenticate -> read -> backup -> bootstrap pointers -> publish templates ->
//! publish action bundles. Stops at the first error; nothing is rolled back.

use super::auth::{Authenticator, CvpAuthenticator};
use super::backup::{write_backup, BackupRole};
use super::records::{change_control_root, fetch, pointer, publish, single, CcType};
use crate::config::SyncSettings;
use crate::context::{ArgBag, ExecutionContext};
use crate::error::UserWarning;
use crate::store::{StoreClient, StoreTarget};
use crate::transport::tls::host_of;
use anyhow::{Context, Result};
use ccaction_shared::{Updates, CVP_DATASET, SCHEMA_VERSION};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Arguments of one sync run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncArgs {
    pub dst_user: String,
    pub dst_password: String,
    /// Destination `host:port`
    pub dst: String,
}

impl SyncArgs {
    pub fn from_args(args: &ArgBag) -> Result<Self, UserWarning> {
        Ok(Self {
            dst_user: args.require("dstUser")?.to_string(),
            dst_password: args.require("dstPassword")?.to_string(),
            dst: args.require("dst")?.to_string(),
        })
    }
}

/// Both collections as read from both servers
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub source_templates: Updates,
    pub dest_templates: Updates,
    pub source_action_bundles: Updates,
    pub dest_action_bundles: Updates,
}

impl Snapshot {
    pub async fn read(source: &dyn StoreClient, destination: &dyn StoreClient) -> Result<Self> {
        let templates = CcType::Template.versioned().wildcard();
        let action_bundles = CcType::ActionBundle.versioned().wildcard();

        Ok(Self {
            source_templates: fetch(source, CVP_DATASET, templates.clone()).await?,
            dest_templates: fetch(destination, CVP_DATASET, templates).await?,
            source_action_bundles: fetch(source, CVP_DATASET, action_bundles.clone()).await?,
            dest_action_bundles: fetch(destination, CVP_DATASET, action_bundles).await?,
        })
    }

    pub fn source(&self, cc_type: CcType) -> &Updates {
        match cc_type {
            CcType::Template => &self.source_templates,
            CcType::ActionBundle => &self.source_action_bundles,
        }
    }
}

const POINTER_CHECK_MESSAGE: &str = "Checking if 'template' and 'actionBundle' pointers exist \
     in cvp:/changecontrol/ and creating if it doesn't.";

/// Mirrors change-control templates and action bundles to another server
pub struct TemplateSync<A = CvpAuthenticator> {
    settings: SyncSettings,
    authenticator: A,
}

impl TemplateSync<CvpAuthenticator> {
    pub fn new(settings: SyncSettings) -> Self {
        let authenticator = CvpAuthenticator::new(&settings);
        Self::with_authenticator(settings, authenticator)
    }
}

impl<A: Authenticator> TemplateSync<A> {
    pub fn with_authenticator(settings: SyncSettings, authenticator: A) -> Self {
        Self {
            settings,
            authenticator,
        }
    }

    pub async fn run(&self, ctx: &dyn ExecutionContext) -> Result<()> {
        let args = SyncArgs::from_args(ctx.args())?;

        let destination = self.connect_destination(ctx, &args).await?;
        let source = ctx.cv_client().context("getting local store client")?;

        let snapshot = Snapshot::read(source.as_ref(), destination.as_ref()).await?;
        info!(
            "Read {} templates and {} action bundles from source",
            snapshot.source_templates.len(),
            snapshot.source_action_bundles.len()
        );

        self.backup(ctx, &snapshot).await?;
        bootstrap_pointers(ctx, destination.as_ref()).await?;

        ctx.alog("Publishing the CC templates to the target cluster...");
        publish_collection(
            destination.as_ref(),
            CcType::Template,
            snapshot.source(CcType::Template),
        )
        .await?;
        ctx.alog("CC templates have been successfully published");

        ctx.alog("Publishing the CC Action Bundles to the target cluster...");
        publish_collection(
            destination.as_ref(),
            CcType::ActionBundle,
            snapshot.source(CcType::ActionBundle),
        )
        .await?;
        ctx.alog("CC action bundles have been successfully published");

        if let Err(e) = destination.close().await {
            warn!("Closing destination store connection: {:#}", e);
        }
        Ok(())
    }

    /// Log in, persist the token and certificate, and open the destination store
    async fn connect_destination(
        &self,
        ctx: &dyn ExecutionContext,
        args: &SyncArgs,
    ) -> Result<Arc<dyn StoreClient>> {
        let credentials = self
            .authenticator
            .login(host_of(&args.dst), &args.dst_user, &args.dst_password)
            .await?;

        let token_path = self.settings.token_path();
        tokio::fs::write(&token_path, &credentials.token)
            .await
            .with_context(|| format!("writing {}", token_path.display()))?;
        let cert_path = self.settings.cert_path();
        tokio::fs::write(&cert_path, &credentials.certificate)
            .await
            .with_context(|| format!("writing {}", cert_path.display()))?;

        let target = StoreTarget::new(args.dst.clone())
            .with_token_file(token_path)
            .with_ca_file(cert_path);
        ctx.connect_store(&target)
            .await
            .with_context(|| format!("connecting to destination store {}", args.dst))
    }

    async fn backup(&self, ctx: &dyn ExecutionContext, snapshot: &Snapshot) -> Result<()> {
        ctx.alog(&format!(
            "Backing up CC templates and actionBundles to {} directory...",
            self.settings.work_dir.display()
        ));
        let backups = [
            (BackupRole::SourceTemplates, &snapshot.source_templates),
            (BackupRole::DestTemplates, &snapshot.dest_templates),
            (BackupRole::SourceActionBundles, &snapshot.source_action_bundles),
            (BackupRole::DestActionBundles, &snapshot.dest_action_bundles),
        ];
        for (role, records) in backups {
            write_backup(&self.settings, role, records).await?;
        }
        ctx.alog("Backup has completed.");
        Ok(())
    }
}

/// Create the collection and version pointers the destination is missing
///
/// The two checks per type are independent. Returns the number of pointers written.
pub async fn bootstrap_pointers(
    ctx: &dyn ExecutionContext,
    destination: &dyn StoreClient,
) -> Result<usize> {
    let cc_pointers = fetch(destination, CVP_DATASET, change_control_root()).await?;
    ctx.alog(POINTER_CHECK_MESSAGE);

    let mut written = 0;
    for cc_type in CcType::ALL {
        let versions = fetch(destination, CVP_DATASET, cc_type.root()).await?;

        if !cc_pointers.contains_key(cc_type.key()) {
            debug!("Creating pointer {} -> {}", change_control_root(), cc_type.root());
            let update = pointer(cc_type.key(), cc_type.root());
            publish(destination, CVP_DATASET, change_control_root(), update).await?;
            written += 1;
        }
        if versions.is_empty() {
            debug!("Creating pointer {} -> {}", cc_type.root(), cc_type.versioned());
            let update = pointer(SCHEMA_VERSION, cc_type.versioned());
            publish(destination, CVP_DATASET, cc_type.root(), update).await?;
            written += 1;
        }
    }
    Ok(written)
}

/// Publish every record, then a pointer to it from the versioned collection
pub async fn publish_collection(
    destination: &dyn StoreClient,
    cc_type: CcType,
    records: &Updates,
) -> Result<()> {
    for (key, value) in records {
        let record_path = cc_type.record_path(key);
        publish(destination, CVP_DATASET, record_path.clone(), single(key, value.clone())).await?;
        publish(destination, CVP_DATASET, cc_type.versioned(), pointer(key, record_path)).await?;
    }
    Ok(())
}
