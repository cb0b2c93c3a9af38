//! Exploration profiles and their registry.
//!
//! A profile parameterizes a run's purpose: the mission statement, the
//! initial instruction, suggested blackboard sections, exploration hints,
//! and stopping criteria. The registry is an explicit object built at
//! startup and passed by reference to whatever needs profile lookup —
//! there is no process-wide profile state.

use tracing::debug;

/// A blackboard section the profile recommends to the model.
#[derive(Debug, Clone)]
pub struct SuggestedSection {
    pub name: String,
    pub description: String,
}

impl SuggestedSection {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// The configuration bundle parameterizing a run's purpose.
#[derive(Debug, Clone)]
pub struct ExplorationProfile {
    pub name: String,
    /// Mission statement, used as the system prompt preamble.
    pub mission: String,
    /// First user message of the run; `{target}` is replaced with the
    /// target path.
    pub initial_instruction: String,
    pub suggested_sections: Vec<SuggestedSection>,
    pub hints: Vec<String>,
    pub completion_criteria: String,
    /// Iterations without a blackboard write before the prompt starts
    /// warning about a stall.
    pub stall_warning_threshold: u32,
}

impl ExplorationProfile {
    /// The profile's initial instruction, interpolated for a target.
    pub fn initial_message(&self, target: &str) -> String {
        self.initial_instruction.replace("{target}", target)
    }
}

/// Explicit name → profile registry.
///
/// Constructed once at startup (normally via
/// [`with_defaults`](ProfileRegistry::with_defaults)) and injected into
/// the components that need lookup. Always holds at least one profile.
#[derive(Debug, Clone)]
pub struct ProfileRegistry {
    profiles: Vec<ExplorationProfile>,
    default_name: String,
}

impl ProfileRegistry {
    /// Registry with the built-in profiles; `codebase` is the default.
    pub fn with_defaults() -> Self {
        let registry = Self {
            profiles: vec![codebase_profile(), onboarding_profile(), security_profile()],
            default_name: "codebase".to_string(),
        };
        debug!("Profile registry initialized: {:?}", registry.names());
        registry
    }

    /// Register an additional profile (builder pattern). Replaces any
    /// existing profile with the same name.
    pub fn with(mut self, profile: ExplorationProfile) -> Self {
        self.profiles.retain(|p| p.name != profile.name);
        self.profiles.push(profile);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ExplorationProfile> {
        self.profiles.iter().find(|p| p.name == name)
    }

    /// The default profile. Falls back to the first registered profile if
    /// the default was replaced.
    pub fn default_profile(&self) -> &ExplorationProfile {
        self.get(&self.default_name).unwrap_or(&self.profiles[0])
    }

    /// Registered profile names, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.profiles.iter().map(|p| p.name.as_str()).collect()
    }
}

// ── Built-in profiles ──────────────────────────────────────────────

fn codebase_profile() -> ExplorationProfile {
    ExplorationProfile {
        name: "codebase".into(),
        mission: "You are a codebase exploration agent. Your job is to build a thorough, \
                  compact understanding of an unfamiliar project and persist everything \
                  you learn into your blackboard."
            .into(),
        initial_instruction: "Explore the project at {target}. Start with the top-level \
                              layout, then dig into the most important source files. \
                              Record findings in the blackboard as you go."
            .into(),
        suggested_sections: vec![
            SuggestedSection::new("overview", "What the project is and does, in a few sentences"),
            SuggestedSection::new("architecture", "Major components and how they fit together"),
            SuggestedSection::new("key_files", "The files that matter most, with one-line roles"),
            SuggestedSection::new("dependencies", "External libraries and what they are used for"),
            SuggestedSection::new("open_questions", "Things you could not resolve"),
        ],
        hints: vec![
            "Read build manifests early; they name the entry points.".into(),
            "Prefer breadth first, then depth on the core modules.".into(),
            "Condense aggressively — record conclusions, not raw output.".into(),
        ],
        completion_criteria: "Stop when the blackboard covers purpose, architecture, key \
                              files, and dependencies well enough that a new developer \
                              could orient themselves from it alone."
            .into(),
        stall_warning_threshold: 3,
    }
}

fn onboarding_profile() -> ExplorationProfile {
    ExplorationProfile {
        name: "onboarding".into(),
        mission: "You are preparing an onboarding guide for a developer joining this \
                  project. Explore with their first week in mind and persist what they \
                  would need to know."
            .into(),
        initial_instruction: "Explore the project at {target} and build an onboarding \
                              guide: how to build it, where to start reading, and what \
                              conventions to follow."
            .into(),
        suggested_sections: vec![
            SuggestedSection::new("getting_started", "How to build, test, and run the project"),
            SuggestedSection::new("code_tour", "Suggested reading order through the source"),
            SuggestedSection::new("conventions", "Naming, layout, and style patterns in use"),
            SuggestedSection::new("gotchas", "Surprising behavior a newcomer would trip on"),
        ],
        hints: vec![
            "READMEs and CI configuration reveal the expected workflows.".into(),
            "Tests show how the authors intend the code to be used.".into(),
        ],
        completion_criteria: "Stop when a newcomer could make their first contribution \
                              using only the blackboard content."
            .into(),
        stall_warning_threshold: 3,
    }
}

fn security_profile() -> ExplorationProfile {
    ExplorationProfile {
        name: "security".into(),
        mission: "You are surveying a codebase for its security-relevant surfaces. Map \
                  where untrusted input enters, how it is validated, and where sensitive \
                  data flows."
            .into(),
        initial_instruction: "Explore the project at {target} focusing on trust \
                              boundaries: input parsing, authentication, file and \
                              network access, and secrets handling."
            .into(),
        suggested_sections: vec![
            SuggestedSection::new("entry_points", "Where external input enters the system"),
            SuggestedSection::new("validation", "How inputs are checked before use"),
            SuggestedSection::new("sensitive_data", "Secrets, credentials, and personal data handling"),
            SuggestedSection::new("risks", "Specific spots deserving closer review"),
        ],
        hints: vec![
            "Search for parsing, deserialization, and subprocess invocation.".into(),
            "Configuration loading often reveals secret-handling patterns.".into(),
        ],
        completion_criteria: "Stop when every externally reachable surface is catalogued \
                              with its validation story."
            .into(),
        stall_warning_threshold: 3,
    }
}
