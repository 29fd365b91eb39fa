use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use rednote_research::cli;
use rednote_research::progress::{ProgressLevel, ProgressSink};
use rednote_research::workflow::launch;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Args::parse();
    let task = args.task.clone();
    let config = args.into_config()?;

    // 进度事件直接打印到终端，tracing 日志默认只输出警告
    let default_level = if config.verbose {
        "rednote_research=debug"
    } else {
        "rednote_research=warn"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let (progress, mut events) = ProgressSink::channel();
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event.level {
                ProgressLevel::Info => println!("[{}] {}", event.stage, event.message),
                ProgressLevel::Warn | ProgressLevel::Error => {
                    eprintln!("[{}] {}", event.stage, event.message)
                }
            }
        }
    });

    println!("🚀 开始研究: {}", task);
    let result = launch(&config, &task, progress).await;
    // 发送端全部释放后打印任务自然结束
    let _ = printer.await;
    let output = result?;

    println!("\n✅ 研究完成");
    println!("   笔记数量: {}", output.documents.len());
    println!("   搜索关键词: {}", output.searched_keywords.join("、"));
    println!("   反思轮次: {}", output.iteration_count);
    if !output.classifications.is_empty() {
        println!(
            "   图片分析: {} 张，可用 {} 张",
            output.classifications.len(),
            output.classifications.usable_count()
        );
    }
    if let Some(outline) = &output.outline {
        let assigned: usize = outline
            .iter()
            .map(|section| section.assigned_images.len())
            .sum();
        println!("   章节配图: {} 个章节，共 {} 张", outline.len(), assigned);
    }
    println!("   结果文件: {}", config.output_path.display());

    Ok(())
}
