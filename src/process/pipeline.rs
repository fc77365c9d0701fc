use super::redirect::Redirections;
use super::ProcessError;

/// Token separating the stages of a pipeline.
pub const PIPE: &str = "|";

/// One command of a pipeline with its own redirections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineStage {
    pub args: Vec<String>,
    pub redirections: Redirections,
}

impl PipelineStage {
    pub fn program(&self) -> &str {
        // `Pipeline::parse` never builds a stage without a command name.
        &self.args[0]
    }
}

/// Commands connected stdout-to-stdin by anonymous pipes. A single command is
/// a pipeline of one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    stages: Vec<PipelineStage>,
}

impl Pipeline {
    pub fn parse(tokens: &[&str]) -> Result<Self, ProcessError> {
        let mut stages = Vec::new();

        for segment in tokens.split(|token| *token == PIPE) {
            if segment.is_empty() {
                return Err(ProcessError::EmptyStage);
            }
            let (args, redirections) = Redirections::extract(segment)?;
            stages.push(PipelineStage { args, redirections });
        }

        Ok(Self { stages })
    }

    pub fn stages(&self) -> &[PipelineStage] {
        &self.stages
    }
}
