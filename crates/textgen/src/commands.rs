use crate::{
    backend::{resume_or_create, TextModel},
    cli::{GenerateArgs, TrainArgs},
    dataset::Corpus,
    model::TrainReport,
    Config, Result,
};

/// Train on `args.corpus_path`, resuming from `args.save_path` if a model is
/// already there, and save the result back to `args.save_path`.
pub fn train<M: TextModel>(args: &TrainArgs, config: &Config) -> Result<TrainReport> {
    let corpus = Corpus::load(&args.corpus_path)?;
    corpus.print_stats();

    let mut model: M = resume_or_create(&args.save_path, &corpus, config)?;

    log::info!("starting model training for {} epoch(s)...", args.epochs);
    let report = model.train(&corpus, args.epochs)?;

    log::info!("Saving model to {:?}", args.save_path);
    model.save(&args.save_path)?;
    Ok(report)
}

pub fn generate<M: TextModel>(args: &GenerateArgs, config: &Config) -> Result<Vec<String>> {
    let mut model = M::load(&args.load_path, config)?;
    model.generate(args.line_count, args.temperature, args.max_chars)
}

#[cfg(test)]
mod test {
    use std::path::PathBuf;

    use super::*;
    use crate::{
        model::test::{tiny_hyperparams, tiny_training, TEST_CORPUS},
        CharRnn, Error,
    };

    struct Workspace(PathBuf);

    impl Workspace {
        fn new(name: &str) -> Self {
            let dir = std::env::temp_dir().join(format!(
                "textgen-commands-{}-{name}",
                std::process::id()
            ));
            std::fs::create_dir_all(&dir).unwrap();
            Self(dir)
        }

        fn path(&self, file: &str) -> PathBuf {
            self.0.join(file)
        }
    }

    impl Drop for Workspace {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.0);
        }
    }

    fn config() -> Config {
        Config {
            seed: Some(1337),
            hyperparams: tiny_hyperparams(),
            training: tiny_training(),
        }
    }

    fn train_args(workspace: &Workspace, epochs: usize) -> TrainArgs {
        TrainArgs {
            corpus_path: workspace.path("corpus.txt"),
            epochs,
            save_path: workspace.path("model.bin"),
        }
    }

    fn generate_args(workspace: &Workspace, temperature: f64, line_count: usize) -> GenerateArgs {
        GenerateArgs {
            load_path: workspace.path("model.bin"),
            temperature,
            line_count,
            max_chars: 100,
        }
    }

    #[test]
    fn test_train_then_generate() {
        let workspace = Workspace::new("scenario");
        std::fs::write(workspace.path("corpus.txt"), TEST_CORPUS).unwrap();

        let report = train::<CharRnn>(&train_args(&workspace, 5), &config()).unwrap();
        assert_eq!(report.epochs(), 5);
        assert!(workspace.path("model.bin").is_file());

        let lines = generate::<CharRnn>(&generate_args(&workspace, 0.5, 3), &config()).unwrap();
        assert_eq!(lines.len(), 3);
        for line in lines {
            assert!(line.chars().count() <= 100);
        }
    }

    #[test]
    fn test_training_twice_resumes() {
        let workspace = Workspace::new("resume");
        std::fs::write(workspace.path("corpus.txt"), TEST_CORPUS).unwrap();

        train::<CharRnn>(&train_args(&workspace, 2), &config()).unwrap();
        let first = std::fs::read(workspace.path("model.bin")).unwrap();

        train::<CharRnn>(&train_args(&workspace, 2), &config()).unwrap();
        let second = std::fs::read(workspace.path("model.bin")).unwrap();
        assert_ne!(first, second);

        let lines = generate::<CharRnn>(&generate_args(&workspace, 1.0, 4), &config()).unwrap();
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn test_resume_with_new_chars() {
        let workspace = Workspace::new("new-chars");
        std::fs::write(workspace.path("corpus.txt"), TEST_CORPUS).unwrap();
        train::<CharRnn>(&train_args(&workspace, 1), &config()).unwrap();

        // 'X' and '!' are not in the saved vocab and get skipped.
        std::fs::write(workspace.path("corpus.txt"), "the cat! X\nXXX\n").unwrap();
        train::<CharRnn>(&train_args(&workspace, 1), &config()).unwrap();
    }

    #[test]
    fn test_greedy_generation_repeats() {
        let workspace = Workspace::new("greedy");
        std::fs::write(workspace.path("corpus.txt"), TEST_CORPUS).unwrap();
        train::<CharRnn>(&train_args(&workspace, 3), &config()).unwrap();

        let args = generate_args(&workspace, 0.0, 2);
        let unseeded = Config {
            seed: None,
            ..config()
        };
        let first = generate::<CharRnn>(&args, &unseeded).unwrap();
        let second = generate::<CharRnn>(&args, &unseeded).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_corpus() {
        let workspace = Workspace::new("missing-corpus");
        let result = train::<CharRnn>(&train_args(&workspace, 1), &config());
        assert!(matches!(result, Err(Error::Configuration(_))));
        assert!(!workspace.path("model.bin").exists());
    }

    #[test]
    fn test_missing_model() {
        let workspace = Workspace::new("missing-model");
        let result = generate::<CharRnn>(&generate_args(&workspace, 0.5, 3), &config());
        assert!(matches!(result, Err(Error::Configuration(_))));
    }
}
