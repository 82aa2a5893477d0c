//! Hikefile parser (external collaborator, C4.13): recursive-descent
//! over the lexer's token stream, building up a [`SpecState`]. The
//! parser never keeps a back-pointer into the artifacts it references —
//! unresolved names are captured in closures and handed to
//! `SpecState::slate_resolver`, run only after every hikefile (including
//! `include`d ones) has been parsed.
//!
//! Grammar (top-level, zero or more stanzas):
//!
//! ```text
//! projectName STR
//! set NAME (STR | INT)
//! setdef NAME (STR | INT)
//! include STR
//! include ifExists STR
//! artifact KIND NAME { ... }       KIND: file | directory | group | tree | split
//! goal NAME { NAME* }
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::artifact::Artifact;
use crate::command_word::CommandWord;
use crate::error::{Arise, BuildError, BuildErrorKind, Frame, Result};
use crate::filter::{FileFilter, FileTypeWanted};
use crate::lexer::{Token, TokenKind};
use crate::location::Location;
use crate::spec_state::SpecState;
use crate::transform::{Transform, UnzipValve, ZipPiece};

/// A transform whose source/destination artifact references have been
/// captured by name but not yet looked up. Built after every hikefile
/// (including `include`d ones) has registered its artifacts, so a
/// transform may name an artifact declared later in the file — the same
/// forward-reference support `slate_resolver` already gives group
/// members and goal members.
type TransformBuilder = Box<dyn FnOnce(&SpecState) -> Result<Transform>>;

fn resolve_ref(state: &SpecState, name_loc: &(String, Location), noun: &str) -> Result<Rc<Artifact>> {
    let (name, location) = name_loc;
    let arise = Arise::new(format!("{noun} '{name}'"), location.clone());
    state.require_artifact(name, &arise)
}

fn resolve_refs(state: &SpecState, refs: &[(String, Location)], noun: &str) -> Result<Vec<Rc<Artifact>>> {
    refs.iter().map(|r| resolve_ref(state, r, noun)).collect()
}

pub struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    state: &'a mut SpecState,
    top_dir: PathBuf,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: Vec<Token>, state: &'a mut SpecState, top_dir: PathBuf) -> Self {
        Self { tokens, pos: 0, state, top_dir }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn syntax_err(&self, message: impl Into<String>) -> BuildError {
        BuildError::at(BuildErrorKind::Syntax(message.into()), self.peek().location.clone())
    }

    fn expect_name(&mut self) -> Result<(String, Location)> {
        let token = self.advance();
        match token.kind {
            TokenKind::Name(n) => Ok((n, token.location)),
            _ => Err(BuildError::at(
                BuildErrorKind::Syntax(format!("expected a name, found {:?}", token.kind)),
                token.location,
            )),
        }
    }

    fn expect_str(&mut self) -> Result<(String, Location)> {
        let token = self.advance();
        match token.kind {
            TokenKind::Str(s) => Ok((s, token.location)),
            _ => Err(BuildError::at(
                BuildErrorKind::Syntax(format!("expected a string literal, found {:?}", token.kind)),
                token.location,
            )),
        }
    }

    fn expect_int(&mut self) -> Result<(i64, Location)> {
        let token = self.advance();
        match token.kind {
            TokenKind::Int(i) => Ok((i, token.location)),
            _ => Err(BuildError::at(
                BuildErrorKind::Syntax(format!("expected an integer literal, found {:?}", token.kind)),
                token.location,
            )),
        }
    }

    fn expect_lbrace(&mut self) -> Result<()> {
        let token = self.advance();
        if token.kind != TokenKind::LBrace {
            return Err(BuildError::at(BuildErrorKind::Syntax("expected '{'".to_string()), token.location));
        }
        Ok(())
    }

    fn at_rbrace(&self) -> bool {
        self.peek().kind == TokenKind::RBrace
    }

    fn expect_rbrace(&mut self) -> Result<()> {
        let token = self.advance();
        if token.kind != TokenKind::RBrace {
            return Err(BuildError::at(BuildErrorKind::Syntax("expected '}'".to_string()), token.location));
        }
        Ok(())
    }

    fn at_eof(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    pub fn parse_hikefile(&mut self) -> Result<()> {
        while !self.at_eof() {
            let (keyword, location) = self.expect_name()?;
            match keyword.as_str() {
                "projectName" => {
                    let (_name, _) = self.expect_str()?;
                    // The project name for a freshly `new`ed SpecState is
                    // fixed at construction time; re-declaring it here is
                    // accepted for top-level hikefiles and ignored for
                    // included ones (both name the same project).
                }
                "set" => self.parse_set(false)?,
                "setdef" => self.parse_set(true)?,
                "include" => self.parse_include(location)?,
                "artifact" => self.parse_artifact()?,
                "goal" => self.parse_goal()?,
                other => return Err(self.syntax_err(format!("unexpected top-level stanza '{other}'"))),
            }
        }
        Ok(())
    }

    fn parse_set(&mut self, is_default: bool) -> Result<()> {
        let (name, location) = self.expect_name()?;
        let token = self.advance();
        match token.kind {
            TokenKind::Str(s) => {
                let value = self.state.interpolate_string(&s, &location)?;
                if is_default {
                    self.state.set_string_default(name, value);
                } else {
                    self.state.set_string(name, value);
                }
            }
            TokenKind::Int(i) => {
                if is_default {
                    self.state.set_int_default(name, i);
                } else {
                    self.state.set_int(name, i);
                }
            }
            _ => {
                return Err(BuildError::at(
                    BuildErrorKind::Syntax("expected a string or integer value".to_string()),
                    token.location,
                ))
            }
        }
        Ok(())
    }

    fn parse_include(&mut self, location: Location) -> Result<()> {
        let if_exists = if let TokenKind::Name(n) = &self.peek().kind {
            if n == "ifExists" {
                self.advance();
                true
            } else {
                false
            }
        } else {
            false
        };
        let (raw_path, _) = self.expect_str()?;
        let path = self.state.interpolate_string(&raw_path, &location)?;
        let resolved = self.top_dir.join(&path);

        let source = match fs::read_to_string(&resolved) {
            Ok(s) => s,
            Err(e) if if_exists && e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(BuildError::at(
                    BuildErrorKind::Syntax(format!("cannot read included hikefile {}: {e}", resolved.display())),
                    location,
                ))
            }
        };

        let rc_path = Rc::new(resolved.clone());
        self.state.push_hikefile(rc_path.clone());
        let tokens = crate::lexer::tokenize(&source, rc_path)?;
        let include_dir = resolved.parent().map(Path::to_path_buf).unwrap_or_else(|| self.top_dir.clone());
        {
            let mut nested = Parser::new(tokens, self.state, include_dir);
            nested.parse_hikefile()?;
        }
        self.state.pop_hikefile();
        Ok(())
    }

    fn parse_goal(&mut self) -> Result<()> {
        let (name, location) = self.expect_name()?;
        self.expect_lbrace()?;
        let mut member_names = Vec::new();
        while !self.at_rbrace() {
            let (member, member_location) = self.expect_name()?;
            member_names.push((member, member_location));
        }
        self.expect_rbrace()?;

        let goal_name = name;
        self.state.slate_resolver(Box::new(move |state: &mut SpecState| {
            let mut goal = Vec::with_capacity(member_names.len());
            for (member, member_location) in &member_names {
                let arise = Arise::new(format!("goal '{goal_name}'"), member_location.clone());
                goal.push(state.require_artifact(member, &arise)?);
            }
            state.register_goal(goal_name.clone(), goal, location)
        }));
        Ok(())
    }

    fn parse_artifact(&mut self) -> Result<()> {
        let (kind, kind_location) = self.expect_name()?;
        let (name, name_location) = self.expect_name()?;
        self.expect_lbrace()?;

        let artifact = match kind.as_str() {
            "file" => self.parse_path_artifact(&name, &name_location, crate::artifact::PathKind::File)?,
            "directory" => self.parse_path_artifact(&name, &name_location, crate::artifact::PathKind::Directory)?,
            "group" => self.parse_group_artifact(&name, &name_location)?,
            "tree" => self.parse_tree_artifact(&name, &name_location)?,
            "split" => self.parse_split_artifact(&name, &name_location)?,
            other => return Err(BuildError::at(BuildErrorKind::Syntax(format!("unknown artifact kind '{other}'")), kind_location)),
        };

        self.expect_rbrace()?;
        let key = self.state.make_key(name.clone());
        let _ = key;
        self.state.register_artifact(name, artifact, name_location)
    }

    fn parse_path_artifact(
        &mut self,
        name: &str,
        name_location: &Location,
        kind: crate::artifact::PathKind,
    ) -> Result<Rc<Artifact>> {
        let mut path: Option<String> = None;
        let mut transform_builder: Option<TransformBuilder> = None;

        while !self.at_rbrace() {
            let (field, field_location) = self.expect_name()?;
            match field.as_str() {
                "path" => {
                    let (raw, loc) = self.expect_str()?;
                    path = Some(self.state.interpolate_string(&raw, &loc)?);
                }
                "generatedBy" => {
                    self.expect_lbrace()?;
                    transform_builder = Some(self.parse_transform(name, name_location)?);
                    self.expect_rbrace()?;
                }
                other => return Err(BuildError::at(BuildErrorKind::Syntax(format!("unknown field '{other}' in artifact body")), field_location)),
            }
        }

        let path = path.ok_or_else(|| {
            BuildError::at(BuildErrorKind::Syntax(format!("artifact '{name}' is missing a 'path'")), name_location.clone())
        })?;

        let id = self.state.next_artifact_id();
        let key = self.state.make_key(name);
        let arise = Arise::new(format!("artifact '{name}'"), name_location.clone());
        let artifact = Rc::new(match kind {
            crate::artifact::PathKind::File => {
                Artifact::new_file(key, id, None, arise, path)
            }
            crate::artifact::PathKind::Directory => {
                Artifact::new_directory(key, id, None, arise, path)
            }
        });
        if let Some(builder) = transform_builder {
            let target = artifact.clone();
            self.state.slate_resolver(Box::new(move |state: &mut SpecState| {
                let transform = builder(state)?;
                target.set_generating_transform(Rc::new(transform));
                Ok(())
            }));
        }
        Ok(artifact)
    }

    fn parse_group_artifact(&mut self, name: &str, name_location: &Location) -> Result<Rc<Artifact>> {
        let mut member_names: Vec<(String, Location)> = Vec::new();
        while !self.at_rbrace() {
            let (field, field_location) = self.expect_name()?;
            if field != "members" {
                return Err(BuildError::at(BuildErrorKind::Syntax(format!("unknown field '{field}' in group artifact")), field_location));
            }
            self.expect_lbrace()?;
            while !self.at_rbrace() {
                member_names.push(self.expect_name()?);
            }
            self.expect_rbrace()?;
        }

        let id = self.state.next_artifact_id();
        let key = self.state.make_key(name);
        let arise = Arise::new(format!("artifact '{name}'"), name_location.clone());
        let placeholder = Rc::new(Artifact::new_group(key, id, None, arise.clone(), Vec::new()));

        let group_name = name.to_string();
        let target = placeholder.clone();
        self.state.slate_resolver(Box::new(move |state: &mut SpecState| {
            let mut children = Vec::with_capacity(member_names.len());
            for (member, member_location) in &member_names {
                let arise = Arise::new(format!("group '{group_name}'"), member_location.clone());
                children.push(state.require_artifact(member, &arise)?);
            }
            target.set_group_children(children);
            Ok(())
        }));

        Ok(placeholder)
    }

    fn parse_tree_artifact(&mut self, name: &str, name_location: &Location) -> Result<Rc<Artifact>> {
        let mut root: Option<String> = None;
        let mut filters: Vec<FileFilter> = Vec::new();
        let mut no_cache = false;

        while !self.at_rbrace() {
            let (field, field_location) = self.expect_name()?;
            match field.as_str() {
                "root" => {
                    let (raw, loc) = self.expect_str()?;
                    root = Some(self.state.interpolate_string(&raw, &loc)?);
                }
                "noCache" => no_cache = true,
                "filter" => filters.push(self.parse_filter()?),
                other => return Err(BuildError::at(BuildErrorKind::Syntax(format!("unknown field '{other}' in tree artifact")), field_location)),
            }
        }

        let root = root.ok_or_else(|| {
            BuildError::at(BuildErrorKind::Syntax(format!("tree artifact '{name}' is missing a 'root'")), name_location.clone())
        })?;

        let id = self.state.next_artifact_id();
        let key = self.state.make_key(name);
        let arise = Arise::new(format!("artifact '{name}'"), name_location.clone());
        Ok(Rc::new(Artifact::new_tree(key, id, None, arise, root, filters, no_cache)))
    }

    fn parse_split_artifact(&mut self, name: &str, name_location: &Location) -> Result<Rc<Artifact>> {
        let mut start: Option<(String, Location)> = None;
        let mut end: Option<(String, Location)> = None;
        while !self.at_rbrace() {
            let (field, field_location) = self.expect_name()?;
            match field.as_str() {
                "start" => start = Some(self.expect_name()?),
                "end" => end = Some(self.expect_name()?),
                other => return Err(BuildError::at(BuildErrorKind::Syntax(format!("unknown field '{other}' in split artifact")), field_location)),
            }
        }
        let (start_name, _) = start.ok_or_else(|| {
            BuildError::at(BuildErrorKind::Syntax(format!("split artifact '{name}' is missing 'start'")), name_location.clone())
        })?;
        let (end_name, _) = end.ok_or_else(|| {
            BuildError::at(BuildErrorKind::Syntax(format!("split artifact '{name}' is missing 'end'")), name_location.clone())
        })?;

        let start_arise = Arise::new(format!("split '{name}' start"), name_location.clone());
        let end_arise = Arise::new(format!("split '{name}' end"), name_location.clone());
        let start_artifact = self.state.require_artifact(&start_name, &start_arise)?;
        let end_artifact = self.state.require_artifact(&end_name, &end_arise)?;

        let id = self.state.next_artifact_id();
        let key = self.state.make_key(name);
        let arise = Arise::new(format!("artifact '{name}'"), name_location.clone());
        Ok(Rc::new(Artifact::new_split(key, id, None, arise, start_artifact, end_artifact)))
    }

    fn parse_filter(&mut self) -> Result<FileFilter> {
        self.expect_lbrace()?;
        let (kind, kind_location) = self.expect_name()?;
        let filter = match kind.as_str() {
            "files" => FileFilter::FileType(FileTypeWanted::Files),
            "directories" => FileFilter::FileType(FileTypeWanted::Directories),
            "wildcard" => {
                let (pattern, _) = self.expect_str()?;
                FileFilter::Wildcard(pattern)
            }
            other => return Err(BuildError::at(BuildErrorKind::Syntax(format!("unknown filter kind '{other}'")), kind_location)),
        };
        self.expect_rbrace()?;
        Ok(filter)
    }

    fn parse_transform(&mut self, artifact_name: &str, artifact_location: &Location) -> Result<TransformBuilder> {
        let (kind, kind_location) = self.expect_name()?;
        let arise = Arise::new(format!("transform for '{artifact_name}'"), artifact_location.clone());
        match kind.as_str() {
            "command" => self.parse_command_transform(arise, false),
            "multiCommand" => self.parse_command_transform(arise, true),
            "copy" => self.parse_copy_transform(arise),
            "zip" => self.parse_zip_transform(arise),
            "unzip" => self.parse_unzip_transform(arise),
            "mkdir" => self.parse_mkdir_transform(arise),
            other => Err(BuildError::at(BuildErrorKind::Syntax(format!("unknown transform kind '{other}'")), kind_location)),
        }
    }

    fn parse_command_transform(&mut self, arise: Arise, multi: bool) -> Result<TransformBuilder> {
        let mut sources = Vec::new();
        let mut destinations = Vec::new();
        let mut words = Vec::new();
        while !self.at_rbrace() {
            let (field, field_location) = self.expect_name()?;
            match field.as_str() {
                "source" => sources.push(self.parse_artifact_ref()?),
                "destination" => destinations.push(self.parse_artifact_ref()?),
                "words" => words = self.parse_command_words()?,
                other => return Err(BuildError::at(BuildErrorKind::Syntax(format!("unknown field '{other}' in command transform")), field_location)),
            }
        }
        if destinations.len() != 1 {
            return Err(BuildError::at(
                BuildErrorKind::Syntax("command transform needs exactly one destination".to_string()),
                arise.location.clone(),
            ));
        }
        let destination = destinations.into_iter().next().unwrap();
        Ok(Box::new(move |state: &SpecState| {
            let sources = resolve_refs(state, &sources, "source")?;
            let destination = resolve_ref(state, &destination, "destination")?;
            if multi {
                Ok(Transform::MultiCommand { sources, destination, words, arise })
            } else {
                Ok(Transform::SingleCommand { sources, destination, words, arise })
            }
        }))
    }

    fn parse_command_words(&mut self) -> Result<Vec<CommandWord>> {
        self.expect_lbrace()?;
        let mut words = Vec::new();
        while !self.at_rbrace() {
            words.push(self.parse_command_word()?);
        }
        self.expect_rbrace()?;
        Ok(words)
    }

    fn parse_command_word(&mut self) -> Result<CommandWord> {
        let token = self.advance();
        match token.kind {
            TokenKind::Str(s) => Ok(CommandWord::Static(s)),
            TokenKind::LBrace => {
                let mut inner = Vec::new();
                while !self.at_rbrace() {
                    inner.push(self.parse_command_word()?);
                }
                self.expect_rbrace()?;
                Ok(CommandWord::Brace(inner))
            }
            TokenKind::Name(n) if n == "source" || n == "destination" || n == "aux" => {
                let (artifact_name, _) = self.expect_name()?;
                let merge = if let TokenKind::Name(m) = &self.peek().kind {
                    if m == "merge" {
                        self.advance();
                        true
                    } else {
                        false
                    }
                } else {
                    false
                };
                let arise = Arise::new(format!("command word referencing '{artifact_name}'"), token.location.clone());
                let artifact = self.state.require_artifact(&artifact_name, &arise)?;
                match n.as_str() {
                    "source" => Ok(CommandWord::Source { artifact, merge }),
                    "destination" => Ok(CommandWord::Destination { artifact, merge }),
                    _ => Ok(CommandWord::Artifact { artifact, merge }),
                }
            }
            other => Err(BuildError::at(BuildErrorKind::Syntax(format!("unexpected token in command word: {other:?}")), token.location)),
        }
    }

    /// Read a name token naming an artifact without resolving it — the
    /// lookup is deferred to the enclosing transform's [`TransformBuilder`],
    /// run once every hikefile has registered its artifacts.
    fn parse_artifact_ref(&mut self) -> Result<(String, Location)> {
        self.expect_name()
    }

    fn parse_copy_transform(&mut self, arise: Arise) -> Result<TransformBuilder> {
        let mut sources = Vec::new();
        let mut destination = None;
        let mut destination_is_dir = false;
        let mut rebase_from = String::new();
        while !self.at_rbrace() {
            let (field, field_location) = self.expect_name()?;
            match field.as_str() {
                "source" => sources.push(self.parse_artifact_ref()?),
                "destination" => destination = Some(self.parse_artifact_ref()?),
                "destinationIsDirectory" => destination_is_dir = true,
                "rebaseFrom" => {
                    let (raw, loc) = self.expect_str()?;
                    rebase_from = self.state.interpolate_string(&raw, &loc)?;
                }
                other => return Err(BuildError::at(BuildErrorKind::Syntax(format!("unknown field '{other}' in copy transform")), field_location)),
            }
        }
        let destination = destination.ok_or_else(|| {
            BuildError::at(BuildErrorKind::Syntax("copy transform needs a destination".to_string()), arise.location.clone())
        })?;
        Ok(Box::new(move |state: &SpecState| {
            let sources = resolve_refs(state, &sources, "source")?;
            let destination = resolve_ref(state, &destination, "destination")?;
            Ok(Transform::Copy { sources, destination, destination_is_dir, rebase_from, arise })
        }))
    }

    fn parse_rename(&mut self) -> Result<(regex::Regex, String)> {
        let (pattern, location) = self.expect_str()?;
        let (replacement, _) = self.expect_str()?;
        let re = crate::filter::compile_regex(&pattern, &location)?;
        Ok((re, replacement))
    }

    fn parse_zip_transform(&mut self, arise: Arise) -> Result<TransformBuilder> {
        let mut all_sources = Vec::new();
        let mut destination = None;
        let mut piece_specs: Vec<(Vec<(String, Location)>, String, String, Option<(regex::Regex, String)>)> = Vec::new();
        while !self.at_rbrace() {
            let (field, field_location) = self.expect_name()?;
            match field.as_str() {
                "destination" => destination = Some(self.parse_artifact_ref()?),
                "piece" => {
                    self.expect_lbrace()?;
                    let mut piece_sources = Vec::new();
                    let mut rebase_from = String::new();
                    let mut rebase_to = String::new();
                    let mut rename = None;
                    while !self.at_rbrace() {
                        let (piece_field, piece_field_location) = self.expect_name()?;
                        match piece_field.as_str() {
                            "source" => piece_sources.push(self.parse_artifact_ref()?),
                            "rebaseFrom" => {
                                let (raw, loc) = self.expect_str()?;
                                rebase_from = self.state.interpolate_string(&raw, &loc)?;
                            }
                            "rebaseTo" => {
                                let (raw, loc) = self.expect_str()?;
                                rebase_to = self.state.interpolate_string(&raw, &loc)?;
                            }
                            "rename" => rename = Some(self.parse_rename()?),
                            other => {
                                return Err(BuildError::at(
                                    BuildErrorKind::Syntax(format!("unknown field '{other}' in zip piece")),
                                    piece_field_location,
                                ))
                            }
                        }
                    }
                    self.expect_rbrace()?;
                    all_sources.extend(piece_sources.iter().cloned());
                    piece_specs.push((piece_sources, rebase_from, rebase_to, rename));
                }
                other => return Err(BuildError::at(BuildErrorKind::Syntax(format!("unknown field '{other}' in zip transform")), field_location)),
            }
        }
        let destination = destination.ok_or_else(|| {
            BuildError::at(BuildErrorKind::Syntax("zip transform needs a destination".to_string()), arise.location.clone())
        })?;
        Ok(Box::new(move |state: &SpecState| {
            let sources = resolve_refs(state, &all_sources, "source")?;
            let destination = resolve_ref(state, &destination, "destination")?;
            let mut pieces = Vec::with_capacity(piece_specs.len());
            for (piece_sources, rebase_from, rebase_to, rename) in piece_specs {
                let piece_sources = resolve_refs(state, &piece_sources, "source")?;
                pieces.push(ZipPiece { sources: piece_sources, rebase_from, rebase_to, rename });
            }
            Ok(Transform::Zip { sources, destination, pieces, arise })
        }))
    }

    fn parse_unzip_transform(&mut self, arise: Arise) -> Result<TransformBuilder> {
        let mut source = None;
        let mut destination = None;
        let mut valves = Vec::new();
        while !self.at_rbrace() {
            let (field, field_location) = self.expect_name()?;
            match field.as_str() {
                "source" => source = Some(self.parse_artifact_ref()?),
                "destination" => destination = Some(self.parse_artifact_ref()?),
                "valve" => {
                    self.expect_lbrace()?;
                    let mut rebase_from = String::new();
                    let mut rebase_to = String::new();
                    let mut rename = None;
                    let mut filters = Vec::new();
                    while !self.at_rbrace() {
                        let (valve_field, valve_field_location) = self.expect_name()?;
                        match valve_field.as_str() {
                            "rebaseFrom" => {
                                let (raw, loc) = self.expect_str()?;
                                rebase_from = self.state.interpolate_string(&raw, &loc)?;
                            }
                            "rebaseTo" => {
                                let (raw, loc) = self.expect_str()?;
                                rebase_to = self.state.interpolate_string(&raw, &loc)?;
                            }
                            "rename" => rename = Some(self.parse_rename()?),
                            "filter" => filters.push(self.parse_filter()?),
                            other => {
                                return Err(BuildError::at(
                                    BuildErrorKind::Syntax(format!("unknown field '{other}' in unzip valve")),
                                    valve_field_location,
                                ))
                            }
                        }
                    }
                    self.expect_rbrace()?;
                    valves.push(UnzipValve { rebase_from, rebase_to, rename, filters });
                }
                other => return Err(BuildError::at(BuildErrorKind::Syntax(format!("unknown field '{other}' in unzip transform")), field_location)),
            }
        }
        let source = source.ok_or_else(|| {
            BuildError::at(BuildErrorKind::Syntax("unzip transform needs a source".to_string()), arise.location.clone())
        })?;
        let destination = destination.ok_or_else(|| {
            BuildError::at(BuildErrorKind::Syntax("unzip transform needs a destination".to_string()), arise.location.clone())
        })?;
        Ok(Box::new(move |state: &SpecState| {
            let source = resolve_ref(state, &source, "source")?;
            let destination = resolve_ref(state, &destination, "destination")?;
            Ok(Transform::Unzip { source, destination, valves, arise })
        }))
    }

    fn parse_mkdir_transform(&mut self, arise: Arise) -> Result<TransformBuilder> {
        let mut destination = None;
        while !self.at_rbrace() {
            let (field, field_location) = self.expect_name()?;
            match field.as_str() {
                "destination" => destination = Some(self.parse_artifact_ref()?),
                other => return Err(BuildError::at(BuildErrorKind::Syntax(format!("unknown field '{other}' in mkdir transform")), field_location)),
            }
        }
        let destination = destination.ok_or_else(|| {
            BuildError::at(BuildErrorKind::Syntax("mkdir transform needs a destination".to_string()), arise.location.clone())
        })?;
        Ok(Box::new(move |state: &SpecState| {
            let destination = resolve_ref(state, &destination, "destination")?;
            Ok(Transform::Mkdir { destination, arise })
        }))
    }
}

/// Parse `source` (already read from `path`) into `state`, attaching a
/// `ParsingArtifact` frame to any error so users can tell which hikefile
/// and location failed.
pub fn parse_into(source: &str, path: Rc<PathBuf>, state: &mut SpecState, top_dir: PathBuf) -> Result<()> {
    let tokens = crate::lexer::tokenize(source, path.clone())?;
    state.push_hikefile(path.clone());
    let mut parser = Parser::new(tokens, state, top_dir);
    let result = parser.parse_hikefile();
    state.pop_hikefile();
    result.map_err(|e| e.with_frame(Frame::ParsingArtifact { location: Location::new(path, 1, 1) }))
}
