//! Dependency Resolution
//!
//! Version constraint checks, activation planning and teardown ordering.
//! Everything here is pure: it reads a snapshot of the registry and returns
//! a plan or an error, so the manager can reject a bad request before any
//! extension callback runs.

use std::collections::{BTreeMap, HashMap, HashSet};

use semver::{Version, VersionReq};

use crate::utils::error::{HostError, HostResult};

/// Snapshot of one registered extension as seen by the planner.
#[derive(Debug, Clone)]
pub struct DependencyNode<'a> {
    pub version: &'a Version,
    pub active: bool,
    /// Extension id -> semver range.
    pub requires: &'a BTreeMap<String, String>,
    /// Minimum host version, if declared.
    pub min_host: Option<&'a str>,
}

/// Dependency resolver for extensions.
pub struct DependencyResolver;

impl DependencyResolver {
    /// Parse a version string.
    pub fn parse_version(raw: &str) -> HostResult<Version> {
        Version::parse(raw.trim())
            .map_err(|e| HostError::validation(format!("Invalid version '{}': {}", raw, e)))
    }

    /// Parse a semver range string.
    pub fn parse_range(raw: &str) -> HostResult<VersionReq> {
        VersionReq::parse(raw.trim())
            .map_err(|e| HostError::validation(format!("Invalid version range '{}': {}", raw, e)))
    }

    /// Check the minimum host version declared by `extension`.
    pub fn check_host(extension: &str, min_host: Option<&str>, host: &Version) -> HostResult<()> {
        let Some(raw) = min_host else {
            return Ok(());
        };
        let minimum = Self::parse_version(raw)?;
        if *host < minimum {
            return Err(HostError::DependencyUnsatisfied {
                extension: extension.to_string(),
                dependency: "host".to_string(),
                required: format!(">={}", minimum),
                actual: Some(host.to_string()),
            });
        }
        Ok(())
    }

    /// Check one declared extension dependency against the resolved version.
    pub fn check_requirement(
        extension: &str,
        dependency: &str,
        range: &str,
        resolved: Option<&Version>,
    ) -> HostResult<()> {
        let req = Self::parse_range(range)?;
        match resolved {
            Some(version) if req.matches(version) => Ok(()),
            other => Err(HostError::DependencyUnsatisfied {
                extension: extension.to_string(),
                dependency: dependency.to_string(),
                required: range.to_string(),
                actual: other.map(ToString::to_string),
            }),
        }
    }

    /// Compute the ordered list of inactive extensions to activate so that
    /// `target` becomes active. Dependencies come first, `target` last.
    ///
    /// Already active extensions are skipped along with their subtrees.
    /// Fails on a missing or mismatched dependency, an unmet host version
    /// or a cycle among the inactive extensions.
    pub fn plan_activation(
        target: &str,
        nodes: &HashMap<&str, DependencyNode<'_>>,
        host: &Version,
    ) -> HostResult<Vec<String>> {
        if !nodes.contains_key(target) {
            return Err(HostError::not_found(format!("Extension not found: {}", target)));
        }

        let mut visited = HashSet::new();
        let mut path = Vec::new();
        let mut order = Vec::new();
        Self::dfs_plan(target, nodes, host, &mut visited, &mut path, &mut order)?;
        Ok(order)
    }

    fn dfs_plan(
        current: &str,
        nodes: &HashMap<&str, DependencyNode<'_>>,
        host: &Version,
        visited: &mut HashSet<String>,
        path: &mut Vec<String>,
        order: &mut Vec<String>,
    ) -> HostResult<()> {
        if let Some(pos) = path.iter().position(|id| id == current) {
            let mut cycle = path[pos..].to_vec();
            cycle.push(current.to_string());
            return Err(HostError::DependencyCycle(cycle));
        }

        if visited.contains(current) {
            return Ok(());
        }

        let Some(node) = nodes.get(current) else {
            return Err(HostError::not_found(format!("Extension not found: {}", current)));
        };

        if node.active {
            visited.insert(current.to_string());
            return Ok(());
        }

        Self::check_host(current, node.min_host, host)?;

        path.push(current.to_string());
        for (dependency, range) in node.requires {
            let resolved = nodes.get(dependency.as_str()).map(|n| n.version);
            Self::check_requirement(current, dependency, range, resolved)?;
            Self::dfs_plan(dependency, nodes, host, visited, path, order)?;
        }
        path.pop();

        visited.insert(current.to_string());
        order.push(current.to_string());
        Ok(())
    }

    /// Order in which to tear down `target` and every active extension that
    /// transitively depends on it: dependents first, `target` last.
    ///
    /// `activation_order` lists active extensions, dependencies before dependents.
    pub fn teardown_order(
        target: &str,
        activation_order: &[String],
        requires_of: impl Fn(&str) -> Vec<String>,
    ) -> Vec<String> {
        let mut affected: HashSet<String> = HashSet::new();
        affected.insert(target.to_string());

        let mut order = vec![target.to_string()];
        let start = activation_order
            .iter()
            .position(|id| id == target)
            .map(|pos| pos + 1)
            .unwrap_or(0);

        for id in &activation_order[start..] {
            if affected.contains(id) {
                continue;
            }
            if requires_of(id).iter().any(|dep| affected.contains(dep)) {
                affected.insert(id.clone());
                order.push(id.clone());
            }
        }

        order.reverse();
        order
    }
}
