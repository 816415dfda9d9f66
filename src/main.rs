use anyhow::{Context, Result, bail};
use clap::Parser;
use log::warn;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clash_speedtest::config::Config;
use clash_speedtest::dialer::DirectAdapter;
use clash_speedtest::output::{GeoLocator, rank_results, save_results};
use clash_speedtest::registry::RegistryBuilder;
use clash_speedtest::speedtest::{DEFAULT_PING_ATTEMPTS, RunStats, SpeedTester};
use clash_speedtest::ui::progress::ProgressTracker;
use clash_speedtest::ui::table::print_results;

/// Clash 节点测速工具
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// 配置来源，文件路径或 http(s) 地址，多个用逗号分隔
    #[arg(short = 'c', long)]
    sources: Option<String>,

    /// 工具自身的配置文件路径
    #[arg(short = 'f', long, default_value = "config.yaml")]
    config: String,

    /// 按名称过滤节点的正则
    #[arg(long)]
    filter: Option<String>,

    /// 名称黑名单关键词，用 | 分隔，如 'rate|x1|1x'
    #[arg(short = 'b', long)]
    block: Option<String>,

    /// 测速服务器地址
    #[arg(long)]
    server_url: Option<String>,

    /// 下载测试总字节数
    #[arg(long)]
    download_size: Option<u64>,

    /// 上传测试总字节数
    #[arg(long)]
    upload_size: Option<u64>,

    /// 超时时间（毫秒）
    #[arg(long)]
    timeout: Option<u64>,

    /// 单个节点测速的并发分块数
    #[arg(long)]
    concurrent: Option<usize>,

    /// 同时测试的节点数
    #[arg(long)]
    parallel: Option<usize>,

    /// 导出达标节点的文件路径
    #[arg(short = 'o', long)]
    output: Option<String>,

    /// 只保留 Stash 兼容的节点
    #[arg(long)]
    stash_compatible: bool,

    /// 延迟上限（毫秒）
    #[arg(long)]
    max_latency: Option<u64>,

    /// 最低下载速度（MB/s）
    #[arg(long)]
    min_download_speed: Option<f64>,

    /// 最低上传速度（MB/s）
    #[arg(long)]
    min_upload_speed: Option<f64>,

    /// 按地理位置和速度重命名导出的节点
    #[arg(long)]
    rename: bool,

    /// 只测延迟
    #[arg(long)]
    fast: bool,

    /// 延迟探测次数，大于 1 时统计抖动和丢包
    #[arg(long)]
    ping_count: Option<usize>,

    /// 统计抖动和丢包，未指定 --ping-count 时按默认次数探测
    #[arg(long)]
    jitter: bool,

    /// 是否显示进度条
    #[arg(long)]
    progress: Option<bool>,

    /// 把合并后的配置写入配置文件后退出
    #[arg(long)]
    write_config: bool,

    /// 日志级别
    #[arg(long)]
    log_level: Option<String>,

    /// 详细输出
    #[arg(short, long)]
    verbose: bool,
}

fn load_config(path: &str) -> Config {
    if Path::new(path).exists() {
        println!("📁 从配置文件加载设置: {}", path);
        match Config::load_from_file(path) {
            Ok(config) => config,
            Err(e) => {
                println!("⚠️  配置文件加载失败: {}", e);
                println!("📝 使用默认配置");
                Config::default()
            }
        }
    } else {
        Config::default()
    }
}

fn apply_args(config: &mut Config, args: &Args) {
    if let Some(sources) = &args.sources {
        config.sources = vec![sources.clone()];
    }
    if let Some(filter) = &args.filter {
        config.filter = filter.clone();
    }
    if let Some(block) = &args.block {
        config.block_keywords = block.clone();
    }
    if let Some(server_url) = &args.server_url {
        config.server_url = server_url.clone();
    }
    if let Some(download_size) = args.download_size {
        config.download_size = download_size;
    }
    if let Some(upload_size) = args.upload_size {
        config.upload_size = upload_size;
    }
    if let Some(timeout) = args.timeout {
        config.timeout = timeout;
    }
    if let Some(concurrent) = args.concurrent {
        config.concurrent = concurrent;
    }
    if let Some(parallel) = args.parallel {
        config.parallel = parallel;
    }
    if let Some(output) = &args.output {
        config.output = Some(output.clone());
    }
    if args.stash_compatible {
        config.stash_compatible = true;
    }
    if let Some(max_latency) = args.max_latency {
        config.max_latency = max_latency;
    }
    if let Some(speed) = args.min_download_speed {
        config.min_download_speed = speed;
    }
    if let Some(speed) = args.min_upload_speed {
        config.min_upload_speed = speed;
    }
    if args.rename {
        config.rename = true;
    }
    if args.fast {
        config.fast_mode = true;
    }
    if let Some(ping_count) = args.ping_count {
        config.ping_count = ping_count;
    } else if args.jitter && config.ping_count <= 1 {
        config.ping_count = DEFAULT_PING_ATTEMPTS;
    }
    if let Some(progress) = args.progress {
        config.print_progress = progress;
    }
    if let Some(log_level) = &args.log_level {
        config.log_level = log_level.clone();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // 解析命令行参数
    let args = Args::parse();

    let mut config = load_config(&args.config);
    apply_args(&mut config, &args);

    // 设置日志级别
    unsafe {
        if args.verbose {
            std::env::set_var("RUST_LOG", "debug");
        } else {
            std::env::set_var("RUST_LOG", &config.log_level);
        }
    }
    env_logger::init();

    if args.write_config {
        config
            .save_to_file(&args.config)
            .with_context(|| format!("写入配置文件 {} 失败", args.config))?;
        println!("✅ 配置已写入: {}", args.config);
        return Ok(());
    }

    if config.source_locators().is_empty() {
        bail!("请通过 -c 或配置文件中的 sources 指定节点来源");
    }

    println!("🚀 Clash 节点测速工具 v{}", env!("CARGO_PKG_VERSION"));
    println!("{:=<80}", "");

    warn!("未接入代理协议实现，所有节点将以直连方式测速");
    let registry = RegistryBuilder::new(config.registry_options(), Arc::new(DirectAdapter))
        .load()
        .await
        .context("加载节点失败")?;

    println!("📦 共 {} 个待测节点", registry.len());
    if registry.blocked_count() > 0 {
        println!("🚫 黑名单排除 {} 个节点", registry.blocked_count());
    }

    let tester = SpeedTester::new(config.speed_test_config()).context("初始化测速引擎失败")?;
    let tracker = ProgressTracker::new(registry.len() as u64, config.print_progress);
    let stats = Arc::new(RunStats::new());

    let mut results = tester
        .test_all(&registry, config.parallel, Arc::clone(&stats), |result| {
            tracker.record(result)
        })
        .await;
    tracker.finalize();

    rank_results(&mut results);
    print_results(&results, config.fast_mode);
    stats.print();

    if let Some(output) = &config.output {
        let geo = if config.rename {
            Some(GeoLocator::new(Duration::from_secs(10))?)
        } else {
            None
        };
        let written = save_results(
            &results,
            &config.export_options(),
            geo.as_ref(),
            Path::new(output),
        )
        .await
        .context("保存结果失败")?;
        if written > 0 {
            println!("\n💾 已保存 {} 个节点到: {}", written, output);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(flags: &[&str]) -> Config {
        let argv = std::iter::once("clash-speedtest").chain(flags.iter().copied());
        let args = Args::parse_from(argv);
        let mut config = Config::default();
        apply_args(&mut config, &args);
        config
    }

    #[test]
    fn test_jitter_uses_default_attempts() {
        assert_eq!(parse(&[]).ping_count, 1);
        assert_eq!(parse(&["--jitter"]).ping_count, DEFAULT_PING_ATTEMPTS);
        assert_eq!(parse(&["--jitter", "--ping-count", "3"]).ping_count, 3);
    }

    #[test]
    fn test_args_override_config() {
        let config = parse(&["-c", "a.yaml,b.yaml", "-b", "x1|rate", "--fast", "--parallel", "4"]);
        assert_eq!(config.sources, vec!["a.yaml,b.yaml".to_string()]);
        assert_eq!(config.block_keywords, "x1|rate");
        assert!(config.fast_mode);
        assert_eq!(config.parallel, 4);
    }
}
