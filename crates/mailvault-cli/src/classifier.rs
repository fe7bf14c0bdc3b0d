use crate::config::ClassifierConfig;
use mailvault_core::classifier::{ClassifierError, DispositionAdapter};
use std::io::{ErrorKind, Write};
use std::process::{Command, Stdio};
use tracing::debug;

pub const MODEL_ENV: &str = "MAILVAULT_CLASSIFIER_MODEL";

/// Runs an external completion command: the prompt goes to stdin, the answer comes from stdout.
#[derive(Debug, Clone)]
pub struct CommandClassifier {
    command: String,
    args: Vec<String>,
    model: Option<String>,
}

impl CommandClassifier {
    pub fn new(config: &ClassifierConfig) -> Self {
        Self {
            command: config.command.clone(),
            args: config.args.clone(),
            model: config.model.clone(),
        }
    }
}

impl DispositionAdapter for CommandClassifier {
    fn recommend(&self, prompt: &str) -> Result<String, ClassifierError> {
        let mut command = Command::new(&self.command);
        command
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(model) = &self.model {
            command.env(MODEL_ENV, model);
        }

        let mut child = command
            .spawn()
            .map_err(|err| ClassifierError::Spawn(format!("{}: {err}", self.command)))?;
        if let Some(mut stdin) = child.stdin.take() {
            // The command may answer without reading the whole prompt.
            if let Err(err) = stdin.write_all(prompt.as_bytes()) {
                if err.kind() != ErrorKind::BrokenPipe {
                    return Err(ClassifierError::Spawn(format!("{}: {err}", self.command)));
                }
            }
        }

        let output = child
            .wait_with_output()
            .map_err(|err| ClassifierError::Spawn(format!("{}: {err}", self.command)))?;
        if !output.status.success() {
            return Err(ClassifierError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let answer = String::from_utf8_lossy(&output.stdout).to_string();
        debug!(command = %self.command, bytes = answer.len(), "classifier answered");
        if answer.trim().is_empty() {
            return Err(ClassifierError::EmptyAnswer);
        }
        Ok(answer)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn shell(script: &str, model: Option<&str>) -> CommandClassifier {
        CommandClassifier::new(&ClassifierConfig {
            command: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
            model: model.map(str::to_string),
        })
    }

    #[test]
    fn stdout_is_the_answer() {
        let classifier = shell("cat >/dev/null; printf 'TRASH\\nbecause promo\\n'", None);
        let answer = classifier.recommend("prompt").expect("answer");
        assert_eq!(answer, "TRASH\nbecause promo\n");
    }

    #[test]
    fn prompt_is_fed_through_stdin() {
        let classifier = shell("head -n 1", None);
        let answer = classifier.recommend("Subject: hi\nrest").expect("answer");
        assert_eq!(answer.trim(), "Subject: hi");
    }

    #[test]
    fn model_is_exported_to_the_command() {
        let classifier = shell("cat >/dev/null; echo \"$MAILVAULT_CLASSIFIER_MODEL\"", Some("small"));
        assert_eq!(classifier.recommend("p").expect("answer").trim(), "small");
    }

    #[test]
    fn failing_command_reports_status_and_stderr() {
        let classifier = shell("cat >/dev/null; echo quota exceeded >&2; exit 3", None);
        let err = classifier.recommend("p").expect_err("non-zero exit");
        match err {
            ClassifierError::Failed { stderr, .. } => assert_eq!(stderr, "quota exceeded"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn blank_output_is_an_empty_answer() {
        let classifier = shell("cat >/dev/null; echo '  '", None);
        assert_eq!(
            classifier.recommend("p").expect_err("blank"),
            ClassifierError::EmptyAnswer
        );
    }

    #[test]
    fn missing_binary_is_a_spawn_error() {
        let classifier = CommandClassifier::new(&ClassifierConfig {
            command: "/nonexistent/mailvault-classifier".to_string(),
            args: Vec::new(),
            model: None,
        });
        assert!(matches!(
            classifier.recommend("p"),
            Err(ClassifierError::Spawn(_))
        ));
    }
}
