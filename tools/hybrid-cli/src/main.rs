use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use hybrid_protocol::{ParserConfig, Relations, Sentence};
use hybrid_parser::{LinearScorer, Predictor, Scorer, Trainer};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Arc-hybrid dependency parser with SWAP")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Train a model on a CoNLL-U treebank
    Train(TrainArgs),
    /// Parse a CoNLL-U file with a trained model
    Predict(PredictArgs),
}

#[derive(Args)]
struct TrainArgs {
    #[arg(long, value_name = "FILE")]
    train: PathBuf,

    /// Parsed after every epoch; the epoch with the best LAS becomes the model
    #[arg(long, value_name = "FILE")]
    dev: Option<PathBuf>,

    #[arg(long, value_name = "FILE")]
    model: PathBuf,

    /// Number of the last epoch
    #[arg(long, default_value_t = 10)]
    epochs: usize,

    /// JSON file with parser settings; flags below override it
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[arg(long)]
    static_oracle: bool,

    #[arg(long)]
    no_head_representation: bool,

    #[arg(long)]
    no_child_representation: bool,

    #[arg(long)]
    descendant_representation: bool,

    #[arg(long, value_name = "K")]
    stack_window: Option<usize>,

    #[arg(long, value_name = "N")]
    swap_budget_multiplier: Option<usize>,

    #[arg(long, value_name = "N")]
    seed: Option<u64>,

    #[arg(long, default_value_t = 100)]
    max_relations: usize,

    #[arg(long, default_value_t = 0.1)]
    learning_rate: f32,

    /// Leave non-projective training trees out
    #[arg(long)]
    drop_nonprojective: bool,

    /// Train on a fresh random sample of N sentences each epoch
    #[arg(long, value_name = "N")]
    max_sentences: Option<usize>,

    /// Resume training from a saved model and its settings
    #[arg(long = "continue-model", visible_alias = "continue", value_name = "FILE")]
    continue_model: Option<PathBuf>,

    /// Number of the first epoch to run, for resumed training
    #[arg(long, default_value_t = 1)]
    first_epoch: usize,

    /// Keep the last epoch instead of the one with the best dev LAS
    #[arg(long)]
    disable_model_selection: bool,
}

#[derive(Args)]
struct PredictArgs {
    #[arg(long, value_name = "FILE")]
    test: PathBuf,

    #[arg(long, value_name = "FILE")]
    model: PathBuf,

    #[arg(long, value_name = "FILE")]
    output: PathBuf,
}

/// Settings stored next to the weights so prediction sees the same features.
#[derive(Debug, Serialize, Deserialize)]
struct ModelCard {
    config: ParserConfig,
    /// Epoch the weights were saved after.
    epoch: usize,
    #[serde(default)]
    dev_las: Option<f64>,
    relations: usize,
    features: usize,
}

impl ModelCard {
    fn new(
        config: &ParserConfig,
        scorer: &LinearScorer,
        epoch: usize,
        dev_las: Option<f64>,
    ) -> Self {
        Self {
            config: config.clone(),
            epoch,
            dev_las,
            relations: scorer.relations().len(),
            features: scorer.feature_count(),
        }
    }
}

fn card_path(model: &Path) -> PathBuf {
    let mut name = model.as_os_str().to_owned();
    name.push(".json");
    PathBuf::from(name)
}

fn read_card(model: &Path) -> anyhow::Result<ModelCard> {
    let path = card_path(model);
    let text = fs::read_to_string(&path).with_context(|| format!("reading {:?}", path))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {:?}", path))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Command::Train(args) => train(args),
        Command::Predict(args) => predict(args),
    }
}

/// Settings file first, then the resumed model's settings, then defaults;
/// flags override whichever applies.
fn load_config(args: &TrainArgs) -> anyhow::Result<ParserConfig> {
    let mut config = match (&args.config, &args.continue_model) {
        (Some(path), _) => {
            let text = fs::read_to_string(path).with_context(|| format!("reading {:?}", path))?;
            serde_json::from_str(&text).with_context(|| format!("parsing {:?}", path))?
        }
        (None, Some(model)) => read_card(model)?.config,
        (None, None) => ParserConfig::default(),
    };

    config.use_static_oracle_instead_of_dynamic |= args.static_oracle;
    if args.no_head_representation {
        config.use_head_representation = false;
    }
    if args.no_child_representation {
        config.use_leftmost_rightmost_child = false;
    }
    config.use_leftmost_rightmost_descendant |= args.descendant_representation;
    if let Some(k) = args.stack_window {
        config.stack_window_k = k;
    }
    if let Some(multiplier) = args.swap_budget_multiplier {
        config.swap_budget_multiplier = multiplier;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }

    config.validate()?;
    Ok(config)
}

fn train(args: TrainArgs) -> anyhow::Result<()> {
    if args.first_epoch == 0 || args.first_epoch > args.epochs {
        anyhow::bail!("--first-epoch must lie in 1..={}", args.epochs);
    }
    let config = load_config(&args)?;

    println!("📖 Reading training data from {:?}...", args.train);
    let mut sentences = hybrid_conllu::read_path(&args.train)?;
    let before = sentences.len();
    sentences.retain(|s| match hybrid_oracle::validate(s) {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(error = %err, "dropping malformed training tree");
            false
        }
    });
    if args.drop_nonprojective {
        sentences.retain(hybrid_oracle::is_projective);
    }
    println!("   {} sentences kept out of {}", sentences.len(), before);

    let dev = match &args.dev {
        Some(path) => Some(hybrid_conllu::read_path(path)?),
        None => None,
    };

    let mut scorer = match &args.continue_model {
        Some(path) => {
            println!("📖 Resuming from {:?}...", path);
            LinearScorer::load(path)?
        }
        None => LinearScorer::new(Relations::collect(&sentences, args.max_relations))
            .with_learning_rate(args.learning_rate),
    };
    println!(
        "⚙️  Training epochs {} to {} over {} relations...",
        args.first_epoch,
        args.epochs,
        scorer.relations().len()
    );

    // Resumed runs continue with a different shuffle than a fresh run.
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed.wrapping_add(args.first_epoch as u64 - 1));
    let mut best = BestEpoch::new(args.epochs);

    for epoch in args.first_epoch..=args.epochs {
        let sample = epoch_sample(&sentences, args.max_sentences, &mut rng);
        let report = Trainer::new(&mut scorer, &config)?.train(&sample, &mut rng);
        println!(
            "   epoch {}: loss {:.3}, errors {:.3}, labeled errors {:.3}, skipped {}",
            epoch,
            report.mean_loss(),
            report.attachment_error_rate(),
            report.labeled_error_rate(),
            report.skipped
        );

        let mut dev_las = None;
        if let Some(dev) = &dev {
            let run = parse_all(&scorer, &config, dev);
            let (uas, las) = attachment_scores(&run.sentences);
            println!("   dev: UAS {:.2}, LAS {:.2}", uas * 100.0, las * 100.0);
            dev_las = Some(las);
            if !args.disable_model_selection && best.observe(epoch, las) {
                tracing::info!(epoch, las, "new best dev score");
            }
        }

        let checkpoint = checkpoint_path(&args.model, epoch);
        save_model(&scorer, &checkpoint, &ModelCard::new(&config, &scorer, epoch, dev_las))?;
    }

    let checkpoint = checkpoint_path(&args.model, best.epoch);
    fs::copy(&checkpoint, &args.model)
        .with_context(|| format!("copying {:?} to {:?}", checkpoint, args.model))?;
    fs::copy(card_path(&checkpoint), card_path(&args.model))?;

    println!("✅ Success! Model from epoch {} written to {:?}", best.epoch, args.model);
    Ok(())
}

fn predict(args: PredictArgs) -> anyhow::Result<()> {
    let card = read_card(&args.model)?;
    card.config.validate()?;

    println!("📖 Loading model from {:?}...", args.model);
    let scorer = LinearScorer::load(&args.model)?;

    let sentences = hybrid_conllu::read_path(&args.test)?;
    println!("⚙️  Parsing {} sentences...", sentences.len());

    let run = parse_all(&scorer, &card.config, &sentences);
    if run.swap_capped > 0 {
        println!("   swap budget reached in {} sentences", run.swap_capped);
    }
    if run.failed > 0 {
        println!("   {} sentences could not be parsed and are written unparsed", run.failed);
    }

    let written = hybrid_conllu::write_path(&args.output, &run.sentences)?;
    println!("✅ Success! {} sentences written to {:?}", written, args.output);
    Ok(())
}

/// Checkpoint written after `epoch`: the model path with the epoch appended.
fn checkpoint_path(model: &Path, epoch: usize) -> PathBuf {
    let mut name = model.as_os_str().to_owned();
    name.push(epoch.to_string());
    PathBuf::from(name)
}

fn save_model(scorer: &LinearScorer, path: &Path, card: &ModelCard) -> anyhow::Result<()> {
    scorer.save(path)?;
    fs::write(card_path(path), serde_json::to_string_pretty(card)?)?;
    Ok(())
}

/// Epoch whose checkpoint becomes the final model.
#[derive(Debug, Clone, Copy, PartialEq)]
struct BestEpoch {
    epoch: usize,
    las: Option<f64>,
}

impl BestEpoch {
    /// Starts at `last`, which wins when no dev score is ever observed.
    fn new(last: usize) -> Self {
        Self { epoch: last, las: None }
    }

    /// Records a dev score. Only a strictly higher score moves the choice,
    /// so ties keep the earlier epoch.
    fn observe(&mut self, epoch: usize, las: f64) -> bool {
        if self.las.map_or(true, |best| las > best) {
            *self = Self { epoch, las: Some(las) };
            true
        } else {
            false
        }
    }
}

/// Training set for one epoch: every sentence, or a fresh random sample of `cap`.
fn epoch_sample<'a, R: Rng + ?Sized>(
    sentences: &'a [Sentence],
    cap: Option<usize>,
    rng: &mut R,
) -> Cow<'a, [Sentence]> {
    match cap {
        Some(cap) if cap < sentences.len() => {
            Cow::Owned(sentences.choose_multiple(rng, cap).cloned().collect())
        }
        _ => Cow::Borrowed(sentences),
    }
}

/// Output of parsing a whole file.
struct ParseRun {
    /// One sentence per input, in order.
    sentences: Vec<Sentence>,
    /// Inputs the parser gave up on; their copies carry no predictions.
    failed: usize,
    swap_capped: usize,
}

fn parse_all<S: Scorer>(scorer: &S, config: &ParserConfig, inputs: &[Sentence]) -> ParseRun {
    let mut predictor = Predictor::new(scorer, config, inputs);
    let mut sentences = Vec::with_capacity(inputs.len());
    let mut failed = 0;

    for (result, input) in predictor.by_ref().zip(inputs) {
        match result {
            Ok(parsed) => sentences.push(parsed),
            Err(err) => {
                failed += 1;
                tracing::warn!(error = %err, sentence = sentences.len() + 1, "parse failed");
                let mut copy = input.clone();
                copy.clear_predictions();
                sentences.push(copy);
            }
        }
    }

    ParseRun { sentences, failed, swap_capped: predictor.swap_capped() }
}

/// Unlabeled and labeled attachment accuracy over annotated tokens.
fn attachment_scores(parsed: &[Sentence]) -> (f64, f64) {
    let mut total = 0usize;
    let mut heads = 0usize;
    let mut labeled = 0usize;
    for token in parsed.iter().flat_map(|s| s.words()) {
        let Some(gold) = token.head else { continue };
        total += 1;
        if token.pred_head == Some(gold) {
            heads += 1;
            if token.pred_relation == token.relation {
                labeled += 1;
            }
        }
    }
    let total = total.max(1) as f64;
    (heads as f64 / total, labeled as f64 / total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hybrid_parser::{MarginLoss, ScoreTable, Scored};
    use hybrid_protocol::{Token, TokenId};
    use hybrid_state::Observation;

    const TREEBANK: &str = "# sent_id = 1\n\
1\tDogs\tdog\tNOUN\tNNS\t_\t2\tnsubj\t_\t_\n\
2\tbark\tbark\tVERB\tVBP\t_\t0\troot\t_\t_\n\
\n\
1\ta\ta\tDET\tDT\t_\t3\tobj\t_\t_\n\
2\tb\tb\tVERB\tVB\t_\t0\troot\t_\t_\n\
3\tc\tc\tNOUN\tNN\t_\t2\txcomp\t_\t_\n\
\n";

    /// Has no arc scores at all, so no parse can finish.
    struct Armless {
        relations: Relations,
    }

    impl Scorer for Armless {
        type Handle = ();

        fn relations(&self) -> &Relations {
            &self.relations
        }

        fn score(&self, _: &Observation<'_>) -> ScoreTable<()> {
            ScoreTable {
                left_arc: Vec::new(),
                right_arc: Vec::new(),
                shift: Scored::new(0.0, ()),
                swap: Scored::new(0.0, ()),
            }
        }

        fn update(&mut self, _: &[MarginLoss<()>]) {}
    }

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("hybrid-cli-{}-{}", name, std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn train_args(argv: &[&str]) -> TrainArgs {
        let cli = Cli::try_parse_from(["hybrid", "train"].iter().chain(argv)).unwrap();
        let Command::Train(args) = cli.command else { panic!("expected train") };
        args
    }

    #[test]
    fn test_card_sits_next_to_model() {
        assert_eq!(card_path(Path::new("out/en.model")), PathBuf::from("out/en.model.json"));
    }

    #[test]
    fn test_checkpoints_append_the_epoch() {
        assert_eq!(checkpoint_path(Path::new("out/en.model"), 3), PathBuf::from("out/en.model3"));
        assert_eq!(
            card_path(&checkpoint_path(Path::new("m"), 12)),
            PathBuf::from("m12.json")
        );
    }

    #[test]
    fn test_best_epoch_needs_a_strictly_higher_score() {
        let mut best = BestEpoch::new(5);
        assert_eq!(best.epoch, 5);

        assert!(best.observe(1, 0.0));
        assert!(best.observe(2, 0.6));
        assert!(!best.observe(3, 0.6));
        assert!(!best.observe(4, 0.4));
        assert_eq!(best, BestEpoch { epoch: 2, las: Some(0.6) });
    }

    #[test]
    fn test_epoch_sample_caps_the_corpus() {
        let sentences = hybrid_conllu::read_str(TREEBANK).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let sample = epoch_sample(&sentences, Some(1), &mut rng);
        assert_eq!(sample.len(), 1);
        assert!(sentences.contains(&sample[0]));

        assert!(matches!(epoch_sample(&sentences, Some(2), &mut rng), Cow::Borrowed(_)));
        assert!(matches!(epoch_sample(&sentences, None, &mut rng), Cow::Borrowed(_)));
    }

    #[test]
    fn test_failed_parses_fall_back_to_the_input() {
        let scorer = Armless { relations: Relations::new(["root"]) };
        let inputs = vec![
            Sentence::new(vec![Token::new(TokenId(1), "Hi").with_gold(TokenId::ROOT, "root")])
                .unwrap(),
            Sentence::new(Vec::new()).unwrap(),
        ];

        let run = parse_all(&scorer, &ParserConfig::default(), &inputs);

        assert_eq!(run.failed, 1);
        assert_eq!(run.sentences, inputs);
        assert_eq!(run.sentences[0].words()[0].pred_head, None);
    }

    #[test]
    fn test_attachment_scores() {
        let mut sentence = Sentence::new(vec![
            Token::new(TokenId(1), "Dogs").with_gold(TokenId(2), "nsubj"),
            Token::new(TokenId(2), "bark").with_gold(TokenId::ROOT, "root"),
        ])
        .unwrap();
        for (id, head, rel) in [(1, 2, "obj"), (2, 0, "root")] {
            let token = sentence.get_mut(TokenId(id)).unwrap();
            token.pred_head = Some(TokenId(head));
            token.pred_relation = Some(rel.to_string());
        }

        let (uas, las) = attachment_scores(&[sentence]);
        assert_eq!(uas, 1.0);
        assert_eq!(las, 0.5);
    }

    #[test]
    fn test_cli_parses_train_flags() {
        let args = train_args(&[
            "--train",
            "t.conllu",
            "--model",
            "m.bin",
            "--static-oracle",
            "--stack-window",
            "2",
            "--max-sentences",
            "50",
            "--first-epoch",
            "4",
        ]);
        let config = load_config(&args).unwrap();
        assert!(config.use_static_oracle_instead_of_dynamic);
        assert_eq!(config.stack_window_k, 2);
        assert_eq!(args.epochs, 10);
        assert_eq!(args.max_sentences, Some(50));
        assert_eq!(args.first_epoch, 4);
        assert!(args.continue_model.is_none());

        let resumed = train_args(&["--train", "t", "--model", "m", "--continue", "old.model"]);
        assert_eq!(resumed.continue_model, Some(PathBuf::from("old.model")));
    }

    #[test]
    fn test_train_keeps_checkpoints_and_resumes() {
        let dir = scratch_dir("train");
        let data = dir.join("train.conllu");
        fs::write(&data, TREEBANK).unwrap();
        let model = dir.join("en.model");
        let (data_arg, model_arg) = (data.to_str().unwrap(), model.to_str().unwrap());

        train(train_args(&[
            "--train", data_arg, "--dev", data_arg, "--model", model_arg, "--epochs", "2",
        ]))
        .unwrap();

        let card = read_card(&model).unwrap();
        assert!(card.epoch == 1 || card.epoch == 2);
        assert!(card.dev_las.is_some());
        for epoch in 1..=2 {
            assert!(checkpoint_path(&model, epoch).exists());
            assert!(card_path(&checkpoint_path(&model, epoch)).exists());
        }
        assert_eq!(
            fs::read(&model).unwrap(),
            fs::read(checkpoint_path(&model, card.epoch)).unwrap()
        );

        // Resuming picks up the saved weights and settings under new epoch numbers.
        train(train_args(&[
            "--train", data_arg, "--model", model_arg, "--continue-model", model_arg,
            "--first-epoch", "3", "--epochs", "3",
        ]))
        .unwrap();
        assert!(checkpoint_path(&model, 3).exists());
        assert_eq!(read_card(&model).unwrap().epoch, 3);

        let output = dir.join("parsed.conllu");
        predict(PredictArgs { test: data.clone(), model: model.clone(), output: output.clone() })
            .unwrap();
        let parsed = hybrid_conllu::read_path(&output).unwrap();
        assert_eq!(parsed.len(), 2);

        assert!(train(train_args(&[
            "--train", data_arg, "--model", model_arg, "--first-epoch", "4", "--epochs", "3",
        ]))
        .is_err());

        fs::remove_dir_all(&dir).unwrap();
    }
}
