//! 命令行入口：翻译本地 HTML 文件

use std::fs;
use std::io::{self, Read, Write};
use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use transor::env::{self, EnvVar};
use transor::parsers::{html_to_dom, serialize_document};
use transor::translation::config::ConfigManager;
use transor::translation::{DisplayStyle, PageTranslator, TranslationResult, TranslationSettings};

#[derive(Parser, Debug)]
#[command(name = "transor", version, about = "Translate HTML documents in place, keeping the original text")]
struct Cli {
    /// 输入 HTML 文件，`-` 表示标准输入
    #[arg(required_unless_present_any = ["init_config", "print_env_docs"])]
    input: Option<String>,

    /// 输出文件，默认写到标准输出
    #[arg(short, long)]
    output: Option<String>,

    /// 目标语言
    #[arg(short = 't', long)]
    target_lang: Option<String>,

    /// 源语言，`auto` 表示自动检测
    #[arg(short = 's', long)]
    source_lang: Option<String>,

    /// 翻译引擎标识
    #[arg(short = 'e', long)]
    engine: Option<String>,

    /// 显示样式: universal, inline, bilingual, tip, replace
    #[arg(long)]
    style: Option<String>,

    /// 翻译后端地址
    #[arg(long)]
    api_url: Option<String>,

    /// 配置文件路径
    #[arg(short, long)]
    config: Option<String>,

    /// 输入文档编码
    #[arg(long, default_value = "utf-8")]
    encoding: String,

    /// 只输出分段结果，每行一个文本组，不发起请求
    #[arg(long)]
    dry_run: bool,

    /// 生成示例配置文件后退出
    #[arg(long, value_name = "PATH")]
    init_config: Option<String>,

    /// 输出环境变量说明后退出
    #[arg(long)]
    print_env_docs: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn init_logging() {
    let level = env::core::LogLevel::get().unwrap_or_else(|e| {
        eprintln!("Warning: {}", e);
        "info".to_string()
    });

    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("transor={}", level))),
        )
        .init();
}

async fn run(cli: Cli) -> TranslationResult<()> {
    if cli.print_env_docs {
        print!("{}", env::generate_env_docs());
        return Ok(());
    }

    if let Some(path) = &cli.init_config {
        ConfigManager::generate_example_config(path)?;
        eprintln!("已生成示例配置: {}", path);
        return Ok(());
    }

    let settings = build_settings(&cli)?;
    let translator = PageTranslator::from_settings(settings)?;

    let input = cli.input.as_deref().unwrap_or("-");
    let data = read_input(input)?;
    let dom = html_to_dom(&data, &cli.encoding)?;

    if cli.dry_run {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        for group in translator.collect_groups(&dom) {
            writeln!(out, "{}", group.text)?;
        }
        return Ok(());
    }

    let report = translator.translate_document(&dom).await?;
    tracing::info!(
        "共 {} 个文本组，写回 {} 个，缓存命中 {} 次",
        report.groups_found,
        report.applied,
        report.stats.cache_hits
    );

    let html = serialize_document(&dom, &cli.encoding)?;
    match &cli.output {
        Some(path) => fs::write(path, html)?,
        None => io::stdout().write_all(&html)?,
    }

    Ok(())
}

fn build_settings(cli: &Cli) -> TranslationResult<TranslationSettings> {
    let mut settings = match &cli.config {
        Some(path) => ConfigManager::from_file(path)?.into_settings(),
        None => ConfigManager::new()?.into_settings(),
    };

    if let Some(lang) = &cli.target_lang {
        settings.target_lang = lang.clone();
    }
    if let Some(lang) = &cli.source_lang {
        settings.source_lang = lang.clone();
    }
    if let Some(engine) = &cli.engine {
        settings.engine = engine.clone();
    }
    if let Some(style) = &cli.style {
        settings.display_style = style.parse::<DisplayStyle>()?;
    }
    if let Some(url) = &cli.api_url {
        settings.api.url = url.clone();
    }

    Ok(settings)
}

fn read_input(input: &str) -> io::Result<Vec<u8>> {
    if input == "-" {
        let mut data = Vec::new();
        io::stdin().read_to_end(&mut data)?;
        Ok(data)
    } else {
        fs::read(input)
    }
}
