//! engine::load
//!
//! Loading a lattice from source text.
//!
//! A load replaces the builder's definitions, lattice and explicit positions
//! wholesale with what the parser produced; nothing is merged with the prior
//! state. The previous state is pushed to the history only once parsing has
//! succeeded, so a failed load leaves the builder exactly as it was.
//!
//! Unlike the other mutators, a load does not rebuild the table unless
//! `rebuild_on_load` is configured.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::builder::LatticeBuilder;
use super::rebuild::RebuildOutcome;
use crate::core::types::{Dialect, UnknownDialect};
use crate::parse::ParseError;

/// Errors from loading a lattice.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The dialect tag is not supported. Raised before any I/O.
    #[error(transparent)]
    UnsupportedDialect(#[from] UnknownDialect),

    #[error("failed to read lattice file '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse lattice file '{path}': {source}")]
    ParseFile { path: PathBuf, source: ParseError },

    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl LatticeBuilder {
    /// Load a lattice file.
    ///
    /// `dialect` must be `"lte"` or `"madx"`.
    ///
    /// # Errors
    ///
    /// - `LoadError::UnsupportedDialect` for any other tag, before the file is touched
    /// - `LoadError::Read` if the file cannot be read
    /// - `LoadError::ParseFile` if the text is malformed
    pub fn load_from_file(
        &mut self,
        path: impl AsRef<Path>,
        dialect: &str,
    ) -> Result<RebuildOutcome, LoadError> {
        let dialect: Dialect = dialect.parse()?;
        self.load_file(path.as_ref(), dialect)
    }

    /// Load a lattice file in the configured default dialect.
    ///
    /// # Errors
    ///
    /// Same as [`LatticeBuilder::load_from_file`], minus the dialect check.
    pub fn load_from_file_default(
        &mut self,
        path: impl AsRef<Path>,
    ) -> Result<RebuildOutcome, LoadError> {
        let dialect = self.config.default_dialect();
        self.load_file(path.as_ref(), dialect)
    }

    /// Load a lattice from source text.
    ///
    /// # Errors
    ///
    /// Returns `LoadError::Parse` if the text is malformed. Nothing is
    /// changed and no snapshot is pushed.
    ///
    /// # Example
    ///
    /// ```
    /// use latticeconstructor::core::types::Dialect;
    /// use latticeconstructor::engine::LatticeBuilder;
    ///
    /// let mut builder = LatticeBuilder::new();
    /// builder
    ///     .load_from_str("D: DRIF, L=1.0\nQ: KQUAD, L=0.5, K1=1.2\nCELL: LINE=(D, Q, D)\n", Dialect::Lte)
    ///     .unwrap();
    ///
    /// assert_eq!(builder.lattice(), ["D", "Q", "D"]);
    /// assert!(builder.table().is_none());
    /// assert!(builder.build_table().is_rebuilt());
    /// ```
    pub fn load_from_str(
        &mut self,
        source: &str,
        dialect: Dialect,
    ) -> Result<RebuildOutcome, LoadError> {
        let parsed = self.parser.parse(source, dialect)?;
        tracing::debug!(
            %dialect,
            definitions = parsed.definitions.len(),
            slots = parsed.lattice.len(),
            "parsed lattice source"
        );

        self.snapshot("load");
        self.state.definitions.replace_all(parsed.definitions);
        self.state.lattice = parsed.lattice;
        self.state.positions = parsed.positions;
        if parsed.name.is_some() {
            self.state.name = parsed.name;
        }

        if self.config.rebuild_on_load() {
            Ok(self.update_table())
        } else {
            Ok(RebuildOutcome::NotAttempted)
        }
    }

    fn load_file(&mut self, path: &Path, dialect: Dialect) -> Result<RebuildOutcome, LoadError> {
        let source = fs::read_to_string(path).map_err(|e| LoadError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;

        self.load_from_str(&source, dialect).map_err(|e| match e {
            LoadError::Parse(source) => LoadError::ParseFile {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{BuilderConfig, Config};
    use crate::core::definitions::ElementDefinition;
    use crate::parse::{LatticeParser, ParsedLattice};

    /// Parser stub that returns a fixed result or a fixed error.
    #[derive(Debug)]
    struct FixedParser(Result<ParsedLattice, ParseError>);

    impl LatticeParser for FixedParser {
        fn parse(&self, _source: &str, _dialect: Dialect) -> Result<ParsedLattice, ParseError> {
            self.0.clone()
        }
    }

    fn parsed() -> ParsedLattice {
        ParsedLattice {
            name: Some("RING".into()),
            positions: None,
            definitions: [("D".to_string(), ElementDefinition::new("DRIF").with_length(1.0))]
                .into_iter()
                .collect(),
            lattice: vec!["D".into(), "D".into()],
        }
    }

    #[test]
    fn load_replaces_state_without_rebuild() {
        let mut builder = LatticeBuilder::new().with_parser(FixedParser(Ok(parsed())));
        builder
            .add_def([("Q", ElementDefinition::new("KQUAD").with_length(1.0))])
            .unwrap();
        builder.add_element("Q");
        let table_before = builder.table().cloned();

        let outcome = builder.load_from_str("ignored", Dialect::Lte).unwrap();
        assert_eq!(outcome, RebuildOutcome::NotAttempted);
        assert_eq!(builder.lattice(), ["D", "D"]);
        assert!(!builder.definitions().contains("Q"));
        assert_eq!(builder.definitions().get("D").unwrap().family(), "DRIFT");
        assert_eq!(builder.name(), Some("RING"));
        assert_eq!(builder.table().cloned(), table_before);
    }

    #[test]
    fn rebuild_on_load_when_configured() {
        let config = Config::from_settings(BuilderConfig {
            rebuild_on_load: Some(true),
            ..Default::default()
        })
        .unwrap();
        let mut builder =
            LatticeBuilder::with_config(config).with_parser(FixedParser(Ok(parsed())));

        let outcome = builder.load_from_str("ignored", Dialect::Madx).unwrap();
        assert_eq!(outcome, RebuildOutcome::Rebuilt { rows: 2 });
    }

    #[test]
    fn parse_failure_leaves_no_trace() {
        let error = ParseError::new(1, 1, "boom");
        let mut builder = LatticeBuilder::new().with_parser(FixedParser(Err(error.clone())));
        builder.add_element("A");
        let before = builder.state().clone();
        let depth = builder.history_len();

        let err = builder.load_from_str("ignored", Dialect::Lte).unwrap_err();
        assert!(matches!(err, LoadError::Parse(e) if e == error));
        assert_eq!(builder.state(), &before);
        assert_eq!(builder.history_len(), depth);
    }

    #[test]
    fn unsupported_dialect_fails_before_io() {
        let mut builder = LatticeBuilder::new();
        let err = builder
            .load_from_file("/definitely/not/here.lte", "tfs")
            .unwrap_err();
        assert!(matches!(err, LoadError::UnsupportedDialect(_)));
        assert_eq!(builder.history_len(), 0);
    }

    #[test]
    fn missing_file_is_read_error() {
        let mut builder = LatticeBuilder::new();
        let err = builder
            .load_from_file("/definitely/not/here.lte", "lte")
            .unwrap_err();
        assert!(matches!(err, LoadError::Read { .. }));
        assert!(err.to_string().contains("here.lte"));
    }

    #[test]
    fn undo_restores_state_before_load() {
        let mut builder = LatticeBuilder::new().with_parser(FixedParser(Ok(parsed())));
        builder.add_element("Q");
        let before = builder.state().clone();

        builder.load_from_str("ignored", Dialect::Lte).unwrap();
        builder.undo();
        assert_eq!(builder.state(), &before);
        assert_eq!(builder.name(), None);
    }
}
