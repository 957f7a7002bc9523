//! scenemux - 场景封装命令行工具
//!
//! 读取 JSON 格式的场景上下文, 编码场景流与 OD 流写入内存 ISO 容器,
//! 输出 JSON 格式的容器报告.

mod logging;

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use scenemux_codec::CodecRegistry;
use scenemux_format::{IsoFile, RawImporter};
use scenemux_manager::{
    Collaborators, EncodeFlags, EncodeOptions, SceneContext, SrtImporter, encode_to_file,
};

#[derive(Parser, Debug)]
#[command(name = "scenemux", version, about = "MPEG-4 场景封装工具")]
struct Cli {
    /// 输入场景上下文 (JSON)
    #[arg(short, long, required_unless_present = "list_encoders")]
    input: Option<PathBuf>,

    /// 输出容器报告路径, 省略时输出到 stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// 封装选项文件 (JSON), 命令行参数覆盖其中的值
    #[arg(long)]
    options: Option<PathBuf>,

    /// 随机访问点间隔 (毫秒)
    #[arg(long = "rap")]
    rap_frequency_ms: Option<u32>,

    /// 随机访问点内联写入主样本
    #[arg(long)]
    rap_inband: bool,

    /// 码流中保留节点名称
    #[arg(long)]
    use_names: bool,

    /// 编码跟踪日志 (追加写入)
    #[arg(long)]
    trace_log: Option<PathBuf>,

    /// 未声明导入指令的流所使用的外部媒体源
    #[arg(long)]
    media_source: Option<PathBuf>,

    /// 日志目录
    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,

    /// 列出内置编码器后退出
    #[arg(long)]
    list_encoders: bool,

    /// 日志级别 (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = logging::init(&cli.log_dir, "scenemux", cli.verbose) {
        eprintln!("警告: 日志初始化失败: {e:#}");
    }

    if let Err(e) = run(&cli) {
        eprintln!("错误: {e:#}");
        process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let mut codecs = CodecRegistry::new();
    scenemux_codec::register_all(&mut codecs);

    if cli.list_encoders {
        print_encoders(&codecs);
        return Ok(());
    }

    let Some(input) = cli.input.as_deref() else {
        anyhow::bail!("必须指定输入场景 (-i <场景文件>)");
    };
    let options = build_options(cli)?;
    let mut ctx = load_context(input)?;
    info!("读取场景 {}: {} 个流", input.display(), ctx.streams.len());

    let mut importer = RawImporter::new();
    let mut subtitles = SrtImporter::new();
    let mut collaborators = Collaborators {
        codecs: &codecs,
        importer: &mut importer,
        subtitles: &mut subtitles,
    };
    let mut file = IsoFile::new();
    encode_to_file(&mut ctx, &mut file, &mut collaborators, &options)
        .with_context(|| format!("封装 {} 失败", input.display()))?;

    let report = serde_json::to_string_pretty(&file.report())?;
    match &cli.output {
        Some(path) => {
            fs::write(path, report)
                .with_context(|| format!("写入报告失败, path={}", path.display()))?;
            info!("报告已写入 {}", path.display());
        }
        None => println!("{report}"),
    }
    Ok(())
}

fn load_context(path: &Path) -> Result<SceneContext> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("读取场景失败, path={}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("解析场景失败, path={}", path.display()))
}

fn build_options(cli: &Cli) -> Result<EncodeOptions> {
    let mut options = match &cli.options {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("读取选项失败, path={}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("解析选项失败, path={}", path.display()))?
        }
        None => EncodeOptions::default(),
    };
    if let Some(rap) = cli.rap_frequency_ms {
        options.rap_frequency_ms = rap;
    }
    if cli.rap_inband {
        options.flags |= EncodeFlags::RAP_INBAND;
    }
    if cli.use_names {
        options.flags |= EncodeFlags::USE_NAMES;
    }
    if cli.trace_log.is_some() {
        options.trace_log = cli.trace_log.clone();
    }
    if cli.media_source.is_some() {
        options.media_source = cli.media_source.clone();
    }
    Ok(options)
}

fn print_encoders(codecs: &CodecRegistry) {
    println!("场景编码器:");
    for (family, name) in codecs.list_scene_encoders() {
        println!("  {:<8} {}", family, name);
    }
    println!("OD 编码器:");
    for name in codecs.list_od_encoders() {
        println!("  {}", name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("scenemux").chain(args.iter().copied()))
    }

    #[test]
    fn test_命令行覆盖选项文件() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("opts.json");
        fs::write(&path, r#"{"rap_frequency_ms": 1000, "flags": "USE_NAMES"}"#).unwrap();
        let cli = parse(&[
            "-i",
            "scene.json",
            "--options",
            path.to_str().unwrap(),
            "--rap",
            "250",
            "--rap-inband",
        ]);
        let options = build_options(&cli).unwrap();
        assert_eq!(options.rap_frequency_ms, 250);
        assert!(options.flags.contains(EncodeFlags::RAP_INBAND));
        assert!(options.flags.contains(EncodeFlags::USE_NAMES));
    }

    #[test]
    fn test_load_context_reports_path() {
        let err = load_context(Path::new("/nonexistent/scene.json")).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/scene.json"));
    }
}
