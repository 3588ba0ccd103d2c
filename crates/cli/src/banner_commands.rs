use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use {
    anyhow::{Context, Result, bail},
    clap::Args,
    nudge_banner::{
        BannerDescription, BannerPage, ClientContext, FileStore, Handler, HostBridge, Recorded,
        StaticBridge, SystemClock, Verdict, description, host_probe,
    },
    nudge_config::NudgeConfig,
    serde_json::json,
    tokio_util::sync::CancellationToken,
    tracing::{debug, info},
};

use crate::config_commands::print_diagnostics;

/// Who is visiting and which banner they get.
#[derive(Args)]
pub struct PageArgs {
    /// User-agent string of the simulated browser.
    #[arg(long, env = "NUDGE_USER_AGENT")]
    user_agent: String,
    /// Navigator vendor (`Google Inc.` for Chrome).
    #[arg(long)]
    vendor: Option<String>,
    /// Promotion template, e.g. `mobile-template`. Defaults to the configured one.
    #[arg(long, conflicts_with = "source")]
    template: Option<String>,
    /// Banner description file or URL.
    #[arg(long)]
    source: Option<String>,
    /// Page URL reported with repeat conversions.
    #[arg(long, default_value = "")]
    url: String,
    /// Referrer reported with repeat conversions.
    #[arg(long, default_value = "")]
    referrer: String,
    /// Flag store file (overrides config value).
    #[arg(long)]
    store: Option<PathBuf>,
}

/// Canned host bridge behaviour. Without one of these the bridge is absent.
#[derive(Args, Default)]
#[group(multiple = false)]
pub struct BridgeArgs {
    /// The extension answers with this version.
    #[arg(long)]
    extension_version: Option<String>,
    /// The bridge reports this error.
    #[arg(long)]
    bridge_error: Option<String>,
    /// The bridge answers without a version.
    #[arg(long)]
    bridge_garbage: bool,
    /// The bridge never answers.
    #[arg(long)]
    bridge_silent: bool,
}

impl BridgeArgs {
    fn bridge(&self) -> Option<Arc<dyn HostBridge>> {
        let bridge = if let Some(version) = &self.extension_version {
            StaticBridge::Reply(json!({ "version": version }))
        } else if let Some(reason) = &self.bridge_error {
            StaticBridge::Fail(reason.clone())
        } else if self.bridge_garbage {
            StaticBridge::Reply(json!({ "status": "ok" }))
        } else if self.bridge_silent {
            StaticBridge::Silent
        } else {
            return None;
        };
        Some(Arc::new(bridge))
    }
}

#[derive(Args)]
pub struct VisitArgs {
    #[command(flatten)]
    page: PageArgs,
    #[command(flatten)]
    bridge: BridgeArgs,
    /// Print the verdict and markup as one JSON object.
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
pub struct ClickArgs {
    /// Handler name: addClicked, alreadyInstalledClicked or noThanksClicked.
    handler: Handler,
    #[command(flatten)]
    page: PageArgs,
}

pub async fn visit(config: &NudgeConfig, args: VisitArgs) -> Result<()> {
    let mut page = open_page(config, &args.page).await?;
    let probe = host_probe(&config.banner, args.bridge.bridge());

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            trigger.cancel();
        }
    });
    let verdict = page.show(&probe, &cancel).await.clone();
    ctrl_c.abort();

    let html = page.render();
    if args.json {
        let out = json!({ "verdict": verdict, "html": html });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        print_verdict(&verdict);
        println!("{html}");
    }
    Ok(())
}

pub async fn click(config: &NudgeConfig, args: ClickArgs) -> Result<()> {
    let mut page = open_page(config, &args.page).await?;
    let event = args.handler.action().records;
    let key = page.insights().keys().key_for(event).to_string();

    match page.click(args.handler) {
        Recorded::Written(at) | Recorded::Refreshed(at) => {
            eprintln!("{} → {key} = {at}", args.handler);
        },
        Recorded::AlreadyPresent(report) => {
            eprintln!("{} → {key} already set; nothing written", args.handler);
            if let Some(report) = report {
                eprintln!(
                    "  repeat reported: referrer={:?} url={:?} user_agent={:?}",
                    report.referrer, report.url, report.user_agent
                );
            }
        },
    }
    if page.dom().removed {
        eprintln!("banner removed");
    } else {
        println!("{}", page.render());
    }
    Ok(())
}

pub async fn validate(config: &NudgeConfig, source: Option<String>, verbose: bool) -> Result<()> {
    let (raw, origin) = read_description(config, source.as_deref(), None).await?;
    eprintln!("Checking {origin}\n");

    let result = description::diagnose(&raw, config.banner.mount_points);
    if print_diagnostics(&result, verbose) > 0 {
        std::process::exit(1);
    }
    Ok(())
}

async fn open_page(config: &NudgeConfig, args: &PageArgs) -> Result<BannerPage> {
    let (raw, origin) =
        read_description(config, args.source.as_deref(), args.template.as_deref()).await?;
    let description = BannerDescription::from_json_str(&raw, &origin)?;

    let client = ClientContext::detect(&args.user_agent, args.vendor.as_deref())
        .with_page(args.url.as_str(), args.referrer.as_str());
    debug!(
        browser = ?client.browser,
        mobile_os = %client.mobile_os,
        "client classified"
    );

    let store_path = store_path(config, args.store.as_deref());
    info!(path = %store_path.display(), "opening flag store");
    let store = Arc::new(FileStore::open(store_path));

    let page = BannerPage::new(
        &config.banner,
        store,
        Arc::new(SystemClock),
        client,
        description,
    )?;
    Ok(page)
}

/// Flag store file: the command-line path, then the configured one, then
/// `flags.json` in the data dir.
pub(crate) fn store_path(config: &NudgeConfig, explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .or_else(|| config.banner.store_path.clone())
        .unwrap_or_else(|| nudge_config::data_dir().join("flags.json"))
}

/// Raw description text plus where it came from.
///
/// An explicit source is fetched or read as given. A template resolves to
/// `<root>/<promotions_dir>/<template>-banner.json`, falling back to the
/// copy embedded in the binary.
async fn read_description(
    config: &NudgeConfig,
    source: Option<&str>,
    template: Option<&str>,
) -> Result<(String, String)> {
    if let Some(source) = source {
        let raw = description::fetch(source).await?;
        return Ok((raw, source.to_string()));
    }

    let template = template.unwrap_or(&config.banner.default_template);
    let path = config.banner.template_path(&config.server.root, template);
    if path.is_file() {
        let origin = path.display().to_string();
        let raw = description::fetch(&origin).await?;
        return Ok((raw, origin));
    }

    let file = format!("promotions/{}-banner.json", template.trim().to_lowercase());
    let Some(bytes) = nudge_web::assets::embedded_file(&file) else {
        bail!(
            "no banner description for template \"{template}\" (looked in {})",
            path.display()
        );
    };
    debug!(%file, "using embedded banner description");
    let raw = std::str::from_utf8(bytes)
        .with_context(|| format!("embedded {file} is not UTF-8"))?
        .to_string();
    Ok((raw, format!("embedded:{file}")))
}

fn print_verdict(verdict: &Verdict) {
    eprintln!("visibility: {:?}", verdict.visibility);
    eprintln!("decided by: {:?}", verdict.decision);
    if verdict.already_have_affordance {
        eprintln!("\"already have it\" link revealed");
    }
    if verdict.unsupported_browser {
        eprintln!("unsupported desktop browser; banner forced hidden");
    }
}
