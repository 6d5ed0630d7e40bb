//! Startup assembly of the repository stack.
//!
//! Every role goes through the same resolution primitive: an explicit
//! override wins, then the lookup service (when present), then a default
//! built from roles resolved earlier. Defaults are never built for a role
//! that was overridden or found.

use std::fmt;
use std::sync::Arc;

use crate::access::{
    DataAccessStrategy, DataAccessStrategyFactory, InsertStrategyFactory, SqlGeneratorSource,
    SqlParametersFactory,
};
use crate::aggregate::{AggregateOperations, AggregateTemplate, NotificationPublisher, TracingPublisher};
use crate::callbacks::EntityCallbacks;
use crate::config::RepositoryConfig;
use crate::conversions::ConversionRegistry;
use crate::converter::{BasicTypeConverter, DeferredRelationResolver, TypeConverter};
use crate::dialect::{DefaultDialectResolver, Dialect, DialectResolver};
use crate::lookup::{ComponentLookup, ComponentLookupExt};
use crate::mapping::MappingContext;
use crate::operations::SqlOperations;
use crate::query_mapping::QueryMappingConfiguration;
use crate::{RepositoryError, Result};

/// A slot in the stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    MappingContext,
    Operations,
    Dialect,
    Conversions,
    Converter,
    DataAccessStrategy,
    AggregateOperations,
    QueryMappingConfiguration,
    Publisher,
    RelationResolver,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::MappingContext => "mapping context",
            Role::Operations => "operations handle",
            Role::Dialect => "dialect",
            Role::Conversions => "custom conversions",
            Role::Converter => "type converter",
            Role::DataAccessStrategy => "data access strategy",
            Role::AggregateOperations => "aggregate operations",
            Role::QueryMappingConfiguration => "query mapping configuration",
            Role::Publisher => "notification publisher",
            Role::RelationResolver => "relation resolver",
        })
    }
}

/// Where a resolved role came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResolutionSource {
    Override,
    Lookup,
    Default,
}

impl fmt::Display for ResolutionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResolutionSource::Override => "override",
            ResolutionSource::Lookup => "lookup",
            ResolutionSource::Default => "default",
        })
    }
}

/// Observer notified once per resolved role, in resolution order.
pub trait AssemblyHook: Send + Sync {
    fn on_resolved(&self, role: Role, source: ResolutionSource);
}

/// Externally supplied roles. Any combination may be set; only the mapping
/// context is required.
#[derive(Clone, Default)]
pub struct StackOverrides {
    mapping_context: Option<Arc<MappingContext>>,
    operations: Option<Arc<dyn SqlOperations>>,
    dialect: Option<Arc<dyn Dialect>>,
    conversions: Option<Arc<ConversionRegistry>>,
    converter: Option<Arc<dyn TypeConverter>>,
    data_access_strategy: Option<Arc<dyn DataAccessStrategy>>,
    aggregate_operations: Option<Arc<dyn AggregateOperations>>,
    query_mapping_configuration: Option<QueryMappingConfiguration>,
    publisher: Option<Arc<dyn NotificationPublisher>>,
}

impl StackOverrides {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides carrying the dialect named by `config`, if any.
    ///
    /// # Errors
    /// Returns an error if the config names an unsupported or inconsistent dialect.
    pub fn from_config(config: &RepositoryConfig) -> Result<Self> {
        let mut overrides = Self::new();
        overrides.dialect = config.dialect_kind()?.map(|kind| kind.dialect());
        Ok(overrides)
    }

    #[must_use]
    pub fn with_mapping_context(mut self, mapping: Arc<MappingContext>) -> Self {
        self.mapping_context = Some(mapping);
        self
    }

    #[must_use]
    pub fn with_operations(mut self, operations: Arc<dyn SqlOperations>) -> Self {
        self.operations = Some(operations);
        self
    }

    #[must_use]
    pub fn with_dialect(mut self, dialect: Arc<dyn Dialect>) -> Self {
        self.dialect = Some(dialect);
        self
    }

    #[must_use]
    pub fn with_conversions(mut self, conversions: Arc<ConversionRegistry>) -> Self {
        self.conversions = Some(conversions);
        self
    }

    #[must_use]
    pub fn with_converter(mut self, converter: Arc<dyn TypeConverter>) -> Self {
        self.converter = Some(converter);
        self
    }

    #[must_use]
    pub fn with_data_access_strategy(mut self, strategy: Arc<dyn DataAccessStrategy>) -> Self {
        self.data_access_strategy = Some(strategy);
        self
    }

    #[must_use]
    pub fn with_aggregate_operations(mut self, operations: Arc<dyn AggregateOperations>) -> Self {
        self.aggregate_operations = Some(operations);
        self
    }

    #[must_use]
    pub fn with_query_mapping_configuration(mut self, config: QueryMappingConfiguration) -> Self {
        self.query_mapping_configuration = Some(config);
        self
    }

    #[must_use]
    pub fn with_publisher(mut self, publisher: Arc<dyn NotificationPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Reject overrides that are present but unusable.
    ///
    /// # Errors
    /// Returns `RepositoryError::InvalidOverride` naming the offending role.
    pub fn validate(&self) -> Result<()> {
        if let Some(dialect) = &self.dialect
            && dialect.name().trim().is_empty()
        {
            return Err(RepositoryError::invalid_override(
                Role::Dialect,
                "dialect name is blank",
            ));
        }
        if let Some(conversions) = &self.conversions
            && conversions.simple_types().is_empty()
        {
            return Err(RepositoryError::invalid_override(
                Role::Conversions,
                "simple type set is empty",
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for StackOverrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StackOverrides")
            .field("mapping_context", &self.mapping_context.is_some())
            .field("operations", &self.operations.is_some())
            .field("dialect", &self.dialect.as_ref().map(|d| d.name().to_owned()))
            .field("conversions", &self.conversions.is_some())
            .field("converter", &self.converter.is_some())
            .field("data_access_strategy", &self.data_access_strategy.is_some())
            .field("aggregate_operations", &self.aggregate_operations.is_some())
            .field("query_mapping_configuration", &self.query_mapping_configuration)
            .field("publisher", &self.publisher.is_some())
            .finish()
    }
}

/// The fully wired stack, immutable after assembly.
#[derive(Clone)]
pub struct ResolvedStack {
    mapping_context: Arc<MappingContext>,
    operations: Option<Arc<dyn SqlOperations>>,
    dialect: Arc<dyn Dialect>,
    conversions: Arc<ConversionRegistry>,
    converter: Arc<dyn TypeConverter>,
    data_access_strategy: Arc<dyn DataAccessStrategy>,
    aggregate_operations: Arc<dyn AggregateOperations>,
    query_mapping_configuration: QueryMappingConfiguration,
    publisher: Arc<dyn NotificationPublisher>,
    entity_callbacks: Option<EntityCallbacks>,
    relation_resolver: Option<Arc<DeferredRelationResolver>>,
}

impl ResolvedStack {
    #[must_use]
    pub fn mapping_context(&self) -> &Arc<MappingContext> {
        &self.mapping_context
    }

    /// `None` when every role that needs the handle was supplied.
    #[must_use]
    pub fn operations(&self) -> Option<&Arc<dyn SqlOperations>> {
        self.operations.as_ref()
    }

    #[must_use]
    pub fn dialect(&self) -> &Arc<dyn Dialect> {
        &self.dialect
    }

    #[must_use]
    pub fn conversions(&self) -> &Arc<ConversionRegistry> {
        &self.conversions
    }

    #[must_use]
    pub fn converter(&self) -> &Arc<dyn TypeConverter> {
        &self.converter
    }

    #[must_use]
    pub fn data_access_strategy(&self) -> &Arc<dyn DataAccessStrategy> {
        &self.data_access_strategy
    }

    #[must_use]
    pub fn aggregate_operations(&self) -> &Arc<dyn AggregateOperations> {
        &self.aggregate_operations
    }

    #[must_use]
    pub fn query_mapping_configuration(&self) -> &QueryMappingConfiguration {
        &self.query_mapping_configuration
    }

    #[must_use]
    pub fn publisher(&self) -> &Arc<dyn NotificationPublisher> {
        &self.publisher
    }

    /// Present only when the stack was assembled with a lookup service.
    #[must_use]
    pub fn entity_callbacks(&self) -> Option<&EntityCallbacks> {
        self.entity_callbacks.as_ref()
    }

    /// The forward reference created for a default type converter, still
    /// unassigned until a repository factory takes over the stack.
    #[must_use]
    pub fn relation_resolver(&self) -> Option<&Arc<DeferredRelationResolver>> {
        self.relation_resolver.as_ref()
    }
}

impl fmt::Debug for ResolvedStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedStack")
            .field("entities", &self.mapping_context.len())
            .field("dialect", &self.dialect.name())
            .field("operations", &self.operations.is_some())
            .field("query_mapping_configuration", &self.query_mapping_configuration)
            .field("entity_callbacks", &self.entity_callbacks)
            .field("relation_resolver", &self.relation_resolver)
            .finish_non_exhaustive()
    }
}

/// Runs the resolution steps in dependency order.
#[derive(Clone)]
pub struct StackAssembler {
    lookup: Option<Arc<dyn ComponentLookup>>,
    dialect_resolver: Arc<dyn DialectResolver>,
    hook: Option<Arc<dyn AssemblyHook>>,
}

impl Default for StackAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl StackAssembler {
    #[must_use]
    pub fn new() -> Self {
        Self {
            lookup: None,
            dialect_resolver: Arc::new(DefaultDialectResolver),
            hook: None,
        }
    }

    #[must_use]
    pub fn with_lookup(mut self, lookup: Arc<dyn ComponentLookup>) -> Self {
        self.lookup = Some(lookup);
        self
    }

    #[must_use]
    pub fn with_dialect_resolver(mut self, resolver: Arc<dyn DialectResolver>) -> Self {
        self.dialect_resolver = resolver;
        self
    }

    #[must_use]
    pub fn with_hook(mut self, hook: Arc<dyn AssemblyHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Resolve every role and return the finished stack.
    ///
    /// Nothing is probed or built when the mapping context is missing or an
    /// override is invalid.
    ///
    /// # Errors
    /// - `MissingConfiguration` if the mapping context is absent, or a default
    ///   needs the operations handle and none is available
    /// - `InvalidOverride` if an override is unusable
    /// - `UnsupportedDialect` if dialect detection matches nothing
    /// - `Operations` if the dialect probe fails
    pub fn assemble(&self, overrides: StackOverrides) -> Result<ResolvedStack> {
        let Some(mapping) = overrides.mapping_context.clone() else {
            return Err(RepositoryError::missing(Role::MappingContext));
        };
        self.notify(Role::MappingContext, ResolutionSource::Override);
        overrides.validate()?;

        let StackOverrides {
            operations,
            dialect,
            conversions,
            converter,
            data_access_strategy,
            aggregate_operations,
            query_mapping_configuration,
            publisher,
            ..
        } = overrides;

        let operations = self.resolve_optional::<dyn SqlOperations>(Role::Operations, operations);
        let require_operations = || {
            operations
                .clone()
                .ok_or_else(|| RepositoryError::missing(Role::Operations))
        };

        let dialect = self.resolve::<dyn Dialect, _>(Role::Dialect, dialect, || {
            let operations = require_operations()?;
            self.dialect_resolver.detect(operations.as_ref())
        })?;

        let conversions = self.resolve(Role::Conversions, conversions, || {
            Ok(Arc::new(ConversionRegistry::for_dialect(dialect.as_ref())))
        })?;

        let mut relation_resolver = None;
        let converter = self.resolve::<dyn TypeConverter, _>(Role::Converter, converter, || {
            let deferred = Arc::new(DeferredRelationResolver::new());
            relation_resolver = Some(deferred.clone());
            let converter: Arc<dyn TypeConverter> = Arc::new(BasicTypeConverter::new(
                mapping.clone(),
                deferred,
                conversions.clone(),
                dialect.as_ref(),
            ));
            Ok(converter)
        })?;

        let data_access_strategy = self.resolve::<dyn DataAccessStrategy, _>(
            Role::DataAccessStrategy,
            data_access_strategy,
            || {
                let operations = require_operations()?;
                let factory = DataAccessStrategyFactory::new(
                    SqlGeneratorSource::new(mapping.clone(), converter.clone(), dialect.clone()),
                    converter.clone(),
                    operations.clone(),
                    SqlParametersFactory::new(mapping.clone(), converter.clone()),
                    InsertStrategyFactory::new(operations, dialect.clone()),
                );
                Ok(factory.create())
            },
        )?;

        let publisher = self.resolve::<dyn NotificationPublisher, _>(Role::Publisher, publisher, || {
            let publisher: Arc<dyn NotificationPublisher> = Arc::new(TracingPublisher);
            Ok(publisher)
        })?;

        let aggregate_operations = self.resolve::<dyn AggregateOperations, _>(
            Role::AggregateOperations,
            aggregate_operations,
            || {
                let template: Arc<dyn AggregateOperations> = Arc::new(AggregateTemplate::new(
                    publisher.clone(),
                    mapping.clone(),
                    converter.clone(),
                    data_access_strategy.clone(),
                ));
                Ok(template)
            },
        )?;

        let query_mapping_configuration = match query_mapping_configuration {
            Some(config) => {
                self.notify(Role::QueryMappingConfiguration, ResolutionSource::Override);
                config
            }
            None => {
                self.notify(Role::QueryMappingConfiguration, ResolutionSource::Default);
                QueryMappingConfiguration::empty()
            }
        };

        let entity_callbacks = self
            .lookup
            .as_ref()
            .map(|lookup| EntityCallbacks::create(lookup.as_ref()));

        tracing::info!(
            dialect = %dialect.name(),
            entities = mapping.len(),
            operations = operations.is_some(),
            "Repository stack assembled"
        );

        Ok(ResolvedStack {
            mapping_context: mapping,
            operations,
            dialect,
            conversions,
            converter,
            data_access_strategy,
            aggregate_operations,
            query_mapping_configuration,
            publisher,
            entity_callbacks,
            relation_resolver,
        })
    }

    /// override → lookup → `default`; `default` runs only when both are absent.
    fn resolve<T, F>(&self, role: Role, explicit: Option<Arc<T>>, default: F) -> Result<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
        F: FnOnce() -> Result<Arc<T>>,
    {
        if let Some(found) = self.resolve_optional(role, explicit) {
            return Ok(found);
        }
        let built = default()?;
        self.notify(role, ResolutionSource::Default);
        Ok(built)
    }

    /// override → lookup, without a default.
    fn resolve_optional<T>(&self, role: Role, explicit: Option<Arc<T>>) -> Option<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        if let Some(explicit) = explicit {
            self.notify(role, ResolutionSource::Override);
            return Some(explicit);
        }
        let found = self.lookup.as_ref()?.lookup_optional::<T>()?;
        self.notify(role, ResolutionSource::Lookup);
        Some(found)
    }

    fn notify(&self, role: Role, source: ResolutionSource) {
        tracing::debug!(role = %role, source = %source, "Resolved repository role");
        if let Some(hook) = &self.hook {
            hook.on_resolved(role, source);
        }
    }
}

impl fmt::Debug for StackAssembler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StackAssembler")
            .field("lookup", &self.lookup.is_some())
            .field("hook", &self.hook.is_some())
            .finish_non_exhaustive()
    }
}
