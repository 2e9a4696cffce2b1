use stagewise::checkpoint::SerializationMode;
use stagewise::logger::init_tracing;
use stagewise::pipeline::{Pipeline, PipelineContext, Stage};
use stagewise::steps::{
    ApplyWordThresholdStep, BagOfWordsVectorizationStep, CleanDatasetStep, LoadCheckpointStep,
    LoadDatasetStep, LowercasingStep, MajorityClassStep, OutputStatisticsStep, RemoveHtmlTagsStep,
    TokenizationStep, TrainTestSplitStep, WhitespaceTrimmingStep,
};
use stagewise::{PipelineConfig, PipelineResult};
use std::path::PathBuf;
use std::process::ExitCode;

const TEXT: &str = "text";
const LABEL: &str = "label";

fn build_pipeline(config: &PipelineConfig, input: PathBuf) -> PipelineResult<Pipeline> {
    let mode = SerializationMode::Opaque;

    let mut loading = Stage::builder("loading");
    let mut processing = Stage::builder("processing");
    if let Some(store) = config.checkpoint_store() {
        loading = loading.add_step(LoadCheckpointStep::new(store.clone(), "loading", "dataset", mode));
        processing =
            processing.add_step(LoadCheckpointStep::new(store, "processing", "dataset", mode));
    }

    let loading = loading
        .add_step(LoadDatasetStep::new(input).require_columns([TEXT, LABEL]))
        .add_step(CleanDatasetStep::new([TEXT]))
        .add_step(RemoveHtmlTagsStep::new([TEXT]))
        .add_step(WhitespaceTrimmingStep::new([TEXT]))
        .add_step(LowercasingStep::new([TEXT]))
        .add_step(ApplyWordThresholdStep::new(TEXT, 1, 512))
        .on_complete(config.checkpoint_saver("dataset", mode).into_hook())
        .build()?;

    let processing = processing
        .add_step(TokenizationStep::new(TEXT, "tokens"))
        .add_step(BagOfWordsVectorizationStep::new("tokens", "vector").max_features(5000))
        .on_complete(config.checkpoint_saver("dataset", mode).into_hook())
        .build()?;

    let training = Stage::builder("training")
        .add_step(TrainTestSplitStep::new("vector", LABEL).test_size(0.2).seed(42))
        .add_step(MajorityClassStep::new())
        .add_step(OutputStatisticsStep::new())
        .build()?;

    Pipeline::builder(&config.run_name)
        .logger(config.logger())
        .add_stage(loading)
        .add_stage(processing)
        .add_stage(training)
        .build()
}

fn run() -> PipelineResult<()> {
    let config = PipelineConfig::from_env()?;
    init_tracing(config.log.min_level);

    let input = std::env::args().nth(1).map(PathBuf::from).ok_or_else(|| {
        stagewise::PipelineError::Config("usage: stagewise <dataset.csv>".to_string())
    })?;

    let pipeline = build_pipeline(&config, input)?;
    let mut context = PipelineContext::new();
    let report = pipeline.run(&mut context)?;

    tracing::info!(
        "Run {} finished: {} steps over {} stages, resumed {:?}",
        context.run_id(),
        report.steps_run(),
        report.stage_reports.len(),
        report.resumed_stages()
    );

    println!("{}", serde_json::to_string_pretty(context.stats())?);
    Ok(())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
