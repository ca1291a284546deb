use clap::Parser;
use docsearch::{
    cli::{Cli, Command, QueryArgs, StatusArgs, UploadArgs},
    config::Config,
    document::{FILE_NAME, PAGE},
    error,
    logging::init_tracing,
    mcp::run_mcp,
    query::QueryRequest,
    service::Services,
};
use serde_json::json;

fn runtime() -> error::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| {
            error::Error::Config(format!("failed to start tokio runtime: {e}"))
        })
}

fn main() -> error::Result<()> {
    let cli = Cli::parse();
    let log_guard = init_tracing(cli.verbose, cli.quiet)?;

    if let Command::Completions(args) = &cli.command {
        args.generate();
        return Ok(());
    }

    let config = Config::from_env()?;
    let services = Services::open(&config)?;

    match cli.command {
        Command::Mcp => run_mcp(services)?,
        Command::Upload(args) => {
            if !runtime()?.block_on(cmd_upload(&services, &args)) {
                drop(log_guard);
                std::process::exit(1);
            }
        }
        Command::Query(args) => {
            runtime()?.block_on(cmd_query(&services, &args))?;
        }
        Command::Status(args) => cmd_status(&services, &args)?,
        Command::Completions(_) => {}
    }

    Ok(())
}

async fn cmd_upload(services: &Services, args: &UploadArgs) -> bool {
    let meta_data = args.meta_data();
    match services.ingestor.ingest(&args.files, &meta_data).await {
        Ok((identifier, report)) => {
            println!(
                "Documents uploaded and indexed successfully with identifier: {identifier}"
            );
            println!(
                "  {} chunks in {} batches ({} replaced)",
                report.inserted, report.batches, report.deleted
            );
            true
        }
        Err(e) => {
            eprintln!("{e}");
            false
        }
    }
}

async fn cmd_query(services: &Services, args: &QueryArgs) -> error::Result<()> {
    let request = QueryRequest {
        query: args.query.clone(),
        metadata_filter: args.metadata_filter(),
        top_k: args.count,
    };
    let results = services.pipeline.run(&request).await?;

    if args.json {
        let items: Vec<_> = results
            .iter()
            .enumerate()
            .map(|(i, doc)| {
                json!({
                    "rank": i + 1,
                    "content": doc.content,
                    "metadata": doc.metadata,
                })
            })
            .collect();
        let out = json!({
            "query": request.query,
            "resultCount": items.len(),
            "results": items,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if results.is_empty() {
        eprintln!("No relevant documents found.");
        return Ok(());
    }

    for (i, doc) in results.iter().enumerate() {
        let source = doc
            .metadata
            .get(FILE_NAME)
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        match doc.metadata.get(PAGE) {
            Some(page) => println!("{}. {source} (page {page})", i + 1),
            None => println!("{}. {source}", i + 1),
        }
        for line in doc.content.lines() {
            println!("   {line}");
        }
        println!();
    }
    Ok(())
}

fn cmd_status(services: &Services, args: &StatusArgs) -> error::Result<()> {
    let report = services.status()?;

    if args.json {
        println!("{}", serde_json::to_string(&report)?);
    } else {
        println!("Vector store: {}", report.vectorstore_dir.display());
        println!("LLM model: {}", report.llm_model);
        println!("Embedding model: {}", report.embedding_model);
        println!("Chunks: {}", report.chunk_count);
        println!("Identifiers: {}", report.identifiers.len());
        for entry in &report.identifiers {
            println!("  {}: {} chunks", entry.identifier, entry.chunks);
        }
    }
    Ok(())
}
