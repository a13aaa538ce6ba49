use crate::{
    app::state::AppState,
    core::{
        document::DocumentProcessor,
        service::rag::dto::{QueryPayload, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE, DEFAULT_TOP_K},
        Chunk,
    },
    error::RagError,
    map_err,
};
use clap::{Args, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Subcommand)]
pub enum Execute {
    /// Index every document in the upload directory, replacing the current index.
    Index(ChunkArgs),

    /// Answer a question from the indexed documents.
    Query(QueryArgs),

    /// Print the state of the index.
    Status,

    /// Preview the chunks of a single document.
    Chunks(ChunkpArgs),

    /// Delete the persisted index.
    DeleteIndex,
}

#[derive(Debug, Args, Clone)]
pub struct ChunkArgs {
    /// Maximum amount of tokens per chunk.
    #[arg(long, default_value = "500")]
    pub chunk_size: usize,

    /// Tokens carried over between adjacent chunks.
    #[arg(long, default_value = "50")]
    pub chunk_overlap: usize,
}

#[derive(Debug, Args, Clone)]
pub struct QueryArgs {
    pub question: String,

    /// Amount of chunks to retrieve.
    #[arg(long, short = 'k', default_value_t = DEFAULT_TOP_K)]
    pub top_k: usize,

    #[arg(long, default_value_t = DEFAULT_TEMPERATURE)]
    pub temperature: f32,

    #[arg(long, default_value_t = DEFAULT_MAX_TOKENS)]
    pub max_tokens: u32,

    /// Replaces the default system prompt.
    #[arg(long)]
    pub system_prompt: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct ChunkpArgs {
    /// Path of the document.
    pub file: PathBuf,

    #[command(flatten)]
    pub chunking: ChunkArgs,

    /// If given, writes the chunks as json to the path.
    #[arg(long, short)]
    pub out: Option<PathBuf>,
}

pub async fn run(command: Execute, state: AppState) -> Result<(), RagError> {
    let service = &state.service;

    match command {
        Execute::Index(ChunkArgs {
            chunk_size,
            chunk_overlap,
        }) => {
            let report = service
                .index_directory(&state.upload_path, chunk_size, chunk_overlap)
                .await?;
            print_json(&report)
        }
        Execute::Query(QueryArgs {
            question,
            top_k,
            temperature,
            max_tokens,
            system_prompt,
        }) => {
            let mut payload = QueryPayload::new(question);
            payload.top_k = top_k;
            payload.temperature = temperature;
            payload.max_tokens = max_tokens;
            payload.system_prompt = system_prompt;

            let response = service.query(payload).await?;
            print_json(&response)
        }
        Execute::Status => print_json(&service.index_status().await?),
        Execute::Chunks(ChunkpArgs {
            file,
            chunking,
            out,
        }) => {
            let document = DocumentProcessor.process(&file).await?;
            let chunks = service.chunk(
                &[document],
                chunking.chunk_size,
                chunking.chunk_overlap,
            )?;

            print_chunks(&chunks);

            if let Some(out) = out {
                let json = map_err!(serde_json::to_vec_pretty(&chunks));
                map_err!(tokio::fs::write(out, json).await);
            }

            Ok(())
        }
        Execute::DeleteIndex => print_json(&service.delete_index().await?),
    }
}

fn print_json(value: &impl Serialize) -> Result<(), RagError> {
    println!("{}", map_err!(serde_json::to_string_pretty(value)));
    Ok(())
}

fn print_chunks(chunks: &[Chunk]) {
    for chunk in chunks {
        println!(
            "Chunk {} ({} tokens) {:=>60}",
            chunk.chunk_id, chunk.token_count, "v"
        );
        println!();
        println!("{}", chunk.text);
        println!();
    }
    println!("Total chunks: {}", chunks.len());
}
