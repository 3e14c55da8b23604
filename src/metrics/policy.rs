// ==============================================================================
// metrics/policy.rs - Field Policy Registry
// ==============================================================================
// Description: Declares how each metric field is combined across shards
// Author: Matt Barham
// Created: 2026-09-29
// Modified: 2026-10-06
// Version: 0.2.0
// ==============================================================================

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use super::fields;
use super::MetricsError;

/// Merge strategy for one field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FieldPolicy {
    /// Combined by arithmetic sum; defaults to zero
    Sum,
    /// Must be identical in every contributing partial
    AssertEqual,
    /// Never merged; computed once after the final merge
    Derived,
}

/// Immutable mapping from field name to merge policy
#[derive(Debug, PartialEq)]
pub struct PolicyRegistry {
    name: &'static str,
    order: Vec<&'static str>,
    policies: HashMap<&'static str, FieldPolicy>,
}

/// Builder for a registry; the only way to add fields
#[derive(Debug)]
pub struct PolicyRegistryBuilder {
    name: &'static str,
    entries: Vec<(&'static str, FieldPolicy)>,
}

impl PolicyRegistryBuilder {
    pub fn field(mut self, field: &'static str, policy: FieldPolicy) -> Self {
        self.entries.push((field, policy));
        self
    }

    pub fn fields(mut self, fields: &[&'static str], policy: FieldPolicy) -> Self {
        self.entries.extend(fields.iter().map(|&f| (f, policy)));
        self
    }

    pub fn build(self) -> Result<PolicyRegistry, MetricsError> {
        let mut order = Vec::with_capacity(self.entries.len());
        let mut policies = HashMap::with_capacity(self.entries.len());

        for (field, policy) in self.entries {
            if policies.insert(field, policy).is_some() {
                return Err(MetricsError::DuplicateField {
                    registry: self.name,
                    field,
                });
            }
            order.push(field);
        }

        Ok(PolicyRegistry {
            name: self.name,
            order,
            policies,
        })
    }
}

impl PolicyRegistry {
    pub fn builder(name: &'static str) -> PolicyRegistryBuilder {
        PolicyRegistryBuilder {
            name,
            entries: Vec::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Look up a field's policy; unknown fields are a configuration error
    pub fn policy_for(&self, field: &str) -> Result<FieldPolicy, MetricsError> {
        self.entry(field).map(|(_, policy)| policy)
    }

    /// Canonical name and policy for a field
    pub(crate) fn entry(&self, field: &str) -> Result<(&'static str, FieldPolicy), MetricsError> {
        self.policies
            .get_key_value(field)
            .map(|(&name, &policy)| (name, policy))
            .ok_or_else(|| MetricsError::UnregisteredField {
                registry: self.name,
                field: field.to_string(),
            })
    }

    pub fn contains(&self, field: &str) -> bool {
        self.policies.contains_key(field)
    }

    /// Fields in registration order
    pub fn fields(&self) -> impl Iterator<Item = (&'static str, FieldPolicy)> + '_ {
        self.order.iter().map(move |&f| (f, self.policies[f]))
    }

    pub fn fields_with(&self, policy: FieldPolicy) -> impl Iterator<Item = &'static str> + '_ {
        self.fields().filter(move |(_, p)| *p == policy).map(|(f, _)| f)
    }

    /// Fail unless every named field is registered
    pub fn ensure_registered<'a, I>(&self, fields: I) -> Result<(), MetricsError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        for field in fields {
            self.policy_for(field)?;
        }
        Ok(())
    }
}

/// The two registries a run works with
///
/// `summary` governs the aggregate record and the summary-shaped part of
/// every sample record; `sample` governs the sample-only fields.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSchema {
    pub summary: Arc<PolicyRegistry>,
    pub sample: Arc<PolicyRegistry>,
}

impl MetricSchema {
    pub fn new(summary: PolicyRegistry, sample: PolicyRegistry) -> Self {
        Self {
            summary: Arc::new(summary),
            sample: Arc::new(sample),
        }
    }

    /// Registries for the arrays calling metrics
    pub fn standard() -> Result<Self, MetricsError> {
        Ok(Self::new(fields::summary_registry()?, fields::sample_registry()?))
    }

    /// Check that report layouts only name registered fields
    pub fn validate_columns(&self) -> Result<(), MetricsError> {
        self.summary.ensure_registered(fields::SUMMARY_COLUMNS.iter().copied())?;

        for &column in fields::DETAIL_COLUMNS {
            if !self.summary.contains(column) {
                self.sample.policy_for(column)?;
            }
        }

        Ok(())
    }
}
