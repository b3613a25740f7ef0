//! `upload <kind>`

use crate::cli::args::{UploadArgs, UploadKind};
use crate::cli::RuntimeConfig;
use crate::error::{AppError, Result};
use crate::resolvers::{self, ResolveContext};
use crate::upload::{ReqwestTransport, RunSummary, UploadPlan, Uploader};

/// Resolve plans for one kind
async fn resolve_plans(ctx: &ResolveContext<'_>, kind: &UploadKind) -> Result<Vec<UploadPlan>> {
    match kind {
        UploadKind::AndroidAab(o) => resolvers::android::aab::resolve(ctx, o).await,
        UploadKind::AndroidNdk(o) => resolvers::android::ndk::resolve(ctx, o).await,
        UploadKind::AndroidProguard(o) => resolvers::android::proguard::resolve(ctx, o),
        UploadKind::Dsym(o) => resolvers::apple::dsym::resolve(ctx, o).await,
        UploadKind::XcodeBuild(o) => resolvers::apple::xcode_build::resolve(ctx, o).await,
        UploadKind::XcodeArchive(o) => resolvers::apple::xcode_archive::resolve(ctx, o).await,
        UploadKind::ReactNativeAndroid(o) => resolvers::react_native::android::resolve(ctx, o),
        UploadKind::ReactNativeIos(o) => resolvers::react_native::ios::resolve(ctx, o).await,
        UploadKind::ReactNativeSourcemaps(o) => {
            resolvers::react_native::sourcemaps::resolve(ctx, o)
        }
        UploadKind::Dart(o) => resolvers::dart::resolve(ctx, o).await,
        UploadKind::UnityAndroid(o) => resolvers::unity::android::resolve(ctx, o).await,
        UploadKind::UnityIos(o) => resolvers::unity::ios::resolve(ctx, o).await,
        UploadKind::Breakpad(o) => resolvers::breakpad::resolve(ctx, o),
        UploadKind::Linux(o) => resolvers::linux::resolve(ctx, o),
        UploadKind::Js(o) => resolvers::js::resolve(ctx, o),
        UploadKind::All(o) => resolvers::discover::resolve(ctx, o),
    }
}

fn tally(total: &mut RunSummary, plan: RunSummary) {
    total.uploaded += plan.uploaded;
    total.duplicates += plan.duplicates;
    total.skipped += plan.skipped;
    total.failed += plan.failed;
}

/// Execute an upload verb
pub(super) async fn execute_upload(args: &UploadArgs, config: &RuntimeConfig) -> Result<()> {
    let output = config.output();
    let ctx = config.context(args.upload_api_root_url.clone(), args.overwrite);
    let options = config.upload_options(args.retries, args.timeout, args.overwrite);

    let plans = tokio::select! {
        _ = config.cancel().cancelled() => return Err(AppError::Cancelled),
        plans = resolve_plans(&ctx, &args.kind) => plans?,
    };

    let transport = ReqwestTransport::new();
    let uploader = Uploader::new(&transport, &options, output, config.cancel());
    let mut total = RunSummary::default();
    let mut first_error: Option<AppError> = None;

    // Plans run strictly in order; a parent kind lists its children first.
    for plan in &plans {
        log::debug!("executing {} plan with {} files", plan.kind, plan.files.len());
        match uploader.execute(plan).await {
            Ok(summary) => tally(&mut total, summary),
            Err(AppError::Cancelled) => return Err(AppError::Cancelled),
            Err(e) if options.fail_on_upload_error => return Err(e),
            Err(e) => {
                output.warn(&format!("{} upload failed: {}", plan.kind, e));
                first_error.get_or_insert(e);
            }
        }
    }

    if let Some(e) = first_error {
        return Err(e);
    }
    if config.is_dry_run() {
        output.success(&format!("Dry run complete, {} files resolved", total.skipped));
    } else if total.uploaded + total.duplicates > 0 {
        output.success(&format!(
            "Uploaded {} files ({} already present)",
            total.uploaded, total.duplicates
        ));
    }
    Ok(())
}
