use std::path::PathBuf;

use clap::Parser;

/// Train a character level text model, resuming from <SAVE_PATH> if a model
/// already exists there.
#[derive(Debug, Parser)]
#[command(name = "train", version)]
pub struct TrainArgs {
    /// Text file to train on. Every non-empty line is one sample.
    pub corpus_path: PathBuf,
    /// Number of passes over the corpus.
    #[arg(value_parser = parse_positive)]
    pub epochs: usize,
    /// Where the model is loaded from (if present) and saved to.
    pub save_path: PathBuf,
}

/// Generate lines of text from a trained model.
#[derive(Debug, Parser)]
#[command(name = "generate", version)]
pub struct GenerateArgs {
    /// Model file written by `train`.
    pub load_path: PathBuf,
    /// Sampling temperature. 0 picks the most likely character every time.
    #[arg(value_parser = parse_temperature)]
    pub temperature: f64,
    /// Number of lines to generate.
    #[arg(value_parser = parse_positive)]
    pub line_count: usize,
    /// Maximum number of characters per line.
    #[arg(value_parser = parse_positive)]
    pub max_chars: usize,
}

fn parse_positive(arg: &str) -> Result<usize, String> {
    match arg.parse::<usize>() {
        Ok(0) => Err("must be greater than zero".into()),
        Ok(value) => Ok(value),
        Err(err) => Err(err.to_string()),
    }
}

fn parse_temperature(arg: &str) -> Result<f64, String> {
    let value = arg.parse::<f64>().map_err(|err| err.to_string())?;
    if !value.is_finite() || value < 0.0 {
        return Err("must be a finite number >= 0".into());
    }

    Ok(value)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_train_args() {
        let args = TrainArgs::try_parse_from(["train", "corpus.txt", "5", "model.bin"]).unwrap();
        assert_eq!(args.corpus_path, PathBuf::from("corpus.txt"));
        assert_eq!(args.epochs, 5);
        assert_eq!(args.save_path, PathBuf::from("model.bin"));
    }

    #[test]
    fn test_train_args_rejected() {
        assert!(TrainArgs::try_parse_from(["train", "corpus.txt", "0", "model.bin"]).is_err());
        assert!(TrainArgs::try_parse_from(["train", "corpus.txt", "five", "model.bin"]).is_err());
        assert!(TrainArgs::try_parse_from(["train", "corpus.txt", "5"]).is_err());
    }

    #[test]
    fn test_generate_args() {
        let args =
            GenerateArgs::try_parse_from(["generate", "model.bin", "0.5", "3", "100"]).unwrap();
        assert_eq!(args.load_path, PathBuf::from("model.bin"));
        assert_eq!(args.temperature, 0.5);
        assert_eq!(args.line_count, 3);
        assert_eq!(args.max_chars, 100);

        let args = GenerateArgs::try_parse_from(["generate", "model.bin", "0", "1", "1"]).unwrap();
        assert_eq!(args.temperature, 0.0);
    }

    #[test]
    fn test_generate_args_rejected() {
        assert!(GenerateArgs::try_parse_from(["generate", "m", "hot", "3", "100"]).is_err());
        assert!(GenerateArgs::try_parse_from(["generate", "m", "NaN", "3", "100"]).is_err());
        assert!(GenerateArgs::try_parse_from(["generate", "m", "0.5", "0", "100"]).is_err());
        assert!(GenerateArgs::try_parse_from(["generate", "m", "0.5", "3", "0"]).is_err());
    }
}
