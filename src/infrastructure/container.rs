//! Container contract and the in-process implementation
//!
//! A container is configured (profiles, property sources, components),
//! refreshed once, queried by type, then closed once. [`GenericContainer`]
//! builds every enabled component eagerly at refresh time and runs teardown
//! hooks in reverse creation order at close time.

use crate::domain::component::{
    BeanFactory, BeanInstance, ComponentCatalog, ComponentDefinition, ComponentId, downcast_bean,
};
use crate::domain::environment::Environment;
use crate::error::{MultiEnvError, Result};
use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

/// The dependency-injection runtime behind one environment
pub trait Container: Send + Sync {
    /// Name used in logs and error messages
    fn display_name(&self) -> &str;

    fn environment(&self) -> &Environment;

    fn environment_mut(&mut self) -> &mut Environment;

    /// Select every catalog component under `locations`; returns how many
    /// definitions were added
    fn scan(&mut self, locations: &[String]) -> Result<usize>;

    /// Select catalog components by identifier
    fn register(&mut self, ids: &[ComponentId]) -> Result<()>;

    /// Finalize configuration and create the components
    fn refresh(&mut self) -> Result<()>;

    /// Refreshed and not yet closed
    fn is_active(&self) -> bool;

    fn get_bean_erased(&self, id: &ComponentId) -> Result<BeanInstance>;

    /// Type names of the created beans, in creation order
    fn bean_names(&self) -> Vec<String>;

    /// Release every bean and run teardown hooks; later calls do nothing
    fn close(&mut self);
}

impl dyn Container + '_ {
    /// Typed bean lookup
    pub fn get_bean<T: Any + Send + Sync>(&self) -> Result<Arc<T>> {
        let id = ComponentId::of::<T>();
        downcast_bean(self.get_bean_erased(&id)?, &id)
    }

    pub fn contains_bean<T: Any + Send + Sync>(&self) -> bool {
        self.get_bean_erased(&ComponentId::of::<T>()).is_ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContainerState {
    Configuring,
    Active,
    Closed,
}

/// Container selecting its components from a [`ComponentCatalog`]
pub struct GenericContainer {
    display_name: String,
    catalog: Arc<ComponentCatalog>,
    environment: Environment,
    definitions: Vec<ComponentDefinition>,
    singletons: HashMap<ComponentId, BeanInstance>,
    creation_order: Vec<ComponentId>,
    state: ContainerState,
}

impl GenericContainer {
    pub fn new(display_name: impl Into<String>, catalog: Arc<ComponentCatalog>) -> Self {
        Self {
            display_name: display_name.into(),
            catalog,
            environment: Environment::new(),
            definitions: Vec::new(),
            singletons: HashMap::new(),
            creation_order: Vec::new(),
            state: ContainerState::Configuring,
        }
    }

    fn ensure_configuring(&self) -> Result<()> {
        match self.state {
            ContainerState::Configuring => Ok(()),
            ContainerState::Active => Err(MultiEnvError::IllegalState(format!(
                "container '{}' has already been refreshed",
                self.display_name
            ))),
            ContainerState::Closed => Err(MultiEnvError::IllegalState(format!(
                "container '{}' has been closed",
                self.display_name
            ))),
        }
    }

    /// Returns false when the type was already selected
    fn add_definition(&mut self, definition: &ComponentDefinition) -> bool {
        if self.definitions.iter().any(|d| d.id() == definition.id()) {
            return false;
        }
        self.definitions.push(definition.clone());
        true
    }

    fn destroy_singletons(&mut self) {
        for id in self.creation_order.iter().rev() {
            let (Some(bean), Some(definition)) = (
                self.singletons.get(id),
                self.definitions.iter().find(|d| d.id() == *id),
            ) else {
                continue;
            };
            tracing::debug!(container = %self.display_name, bean = %id, "destroying bean");
            definition.destroy(bean);
        }
        self.singletons.clear();
        self.creation_order.clear();
    }
}

impl Container for GenericContainer {
    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn environment(&self) -> &Environment {
        &self.environment
    }

    fn environment_mut(&mut self) -> &mut Environment {
        &mut self.environment
    }

    fn scan(&mut self, locations: &[String]) -> Result<usize> {
        self.ensure_configuring()?;

        let catalog = Arc::clone(&self.catalog);
        let mut added = 0;
        for location in locations {
            for definition in catalog.scan(location) {
                if self.add_definition(definition) {
                    added += 1;
                }
            }
        }

        tracing::debug!(container = %self.display_name, ?locations, added, "scanned locations");
        Ok(added)
    }

    fn register(&mut self, ids: &[ComponentId]) -> Result<()> {
        self.ensure_configuring()?;

        let catalog = Arc::clone(&self.catalog);
        for id in ids {
            let definition = catalog.get(id).ok_or_else(|| {
                MultiEnvError::InvalidArgument(format!("component {id} is not in the catalog"))
            })?;
            self.add_definition(definition);
        }
        Ok(())
    }

    fn refresh(&mut self) -> Result<()> {
        self.ensure_configuring()?;

        let enabled: Vec<&ComponentDefinition> = self
            .definitions
            .iter()
            .filter(|d| d.is_enabled_in(&self.environment))
            .collect();

        let creator = BeanCreator::new(&self.display_name, &self.environment, &enabled);
        let result = enabled
            .iter()
            .try_for_each(|definition| creator.get_or_create(definition).map(|_| ()));
        let (singletons, creation_order) = creator.into_parts();

        self.singletons = singletons;
        self.creation_order = creation_order;

        match result {
            Ok(()) => {
                self.state = ContainerState::Active;
                tracing::debug!(
                    container = %self.display_name,
                    beans = self.singletons.len(),
                    "container refreshed"
                );
                Ok(())
            }
            Err(e) => {
                // beans created before the failure still get their teardown
                self.destroy_singletons();
                self.state = ContainerState::Closed;
                Err(e)
            }
        }
    }

    fn is_active(&self) -> bool {
        self.state == ContainerState::Active
    }

    fn get_bean_erased(&self, id: &ComponentId) -> Result<BeanInstance> {
        if self.state != ContainerState::Active {
            return Err(MultiEnvError::IllegalState(format!(
                "container '{}' is not active",
                self.display_name
            )));
        }

        self.singletons
            .get(id)
            .cloned()
            .ok_or_else(|| MultiEnvError::BeanNotFound {
                environment: self.display_name.clone(),
                type_name: id.type_name().to_string(),
            })
    }

    fn bean_names(&self) -> Vec<String> {
        self.creation_order
            .iter()
            .map(|id| id.type_name().to_string())
            .collect()
    }

    fn close(&mut self) {
        match self.state {
            ContainerState::Closed => {}
            ContainerState::Configuring => self.state = ContainerState::Closed,
            ContainerState::Active => {
                self.destroy_singletons();
                self.state = ContainerState::Closed;
                tracing::debug!(container = %self.display_name, "container closed");
            }
        }
    }
}

impl Drop for GenericContainer {
    fn drop(&mut self) {
        self.close();
    }
}

/// Creates beans during one refresh, resolving dependencies on demand
struct BeanCreator<'a> {
    container_name: &'a str,
    environment: &'a Environment,
    definitions: &'a [&'a ComponentDefinition],
    singletons: RefCell<HashMap<ComponentId, BeanInstance>>,
    creation_order: RefCell<Vec<ComponentId>>,
    in_creation: RefCell<Vec<ComponentId>>,
}

impl<'a> BeanCreator<'a> {
    fn new(
        container_name: &'a str,
        environment: &'a Environment,
        definitions: &'a [&'a ComponentDefinition],
    ) -> Self {
        Self {
            container_name,
            environment,
            definitions,
            singletons: RefCell::new(HashMap::new()),
            creation_order: RefCell::new(Vec::new()),
            in_creation: RefCell::new(Vec::new()),
        }
    }

    fn get_or_create(&self, definition: &ComponentDefinition) -> Result<BeanInstance> {
        let id = definition.id();

        if let Some(bean) = self.singletons.borrow().get(&id) {
            return Ok(Arc::clone(bean));
        }

        if self.in_creation.borrow().contains(&id) {
            let chain = self
                .in_creation
                .borrow()
                .iter()
                .map(ComponentId::short_name)
                .collect::<Vec<_>>()
                .join(" -> ");
            return Err(MultiEnvError::BeanCreation {
                type_name: id.type_name().to_string(),
                reason: format!("circular dependency: {chain} -> {}", id.short_name()),
            });
        }

        self.in_creation.borrow_mut().push(id);
        let created = definition.create(self);
        self.in_creation.borrow_mut().pop();

        let bean = created.map_err(|e| MultiEnvError::BeanCreation {
            type_name: id.type_name().to_string(),
            reason: e.to_string(),
        })?;

        self.singletons.borrow_mut().insert(id, Arc::clone(&bean));
        self.creation_order.borrow_mut().push(id);
        tracing::trace!(container = %self.container_name, bean = %id, "bean created");
        Ok(bean)
    }

    fn into_parts(self) -> (HashMap<ComponentId, BeanInstance>, Vec<ComponentId>) {
        (self.singletons.into_inner(), self.creation_order.into_inner())
    }
}

impl BeanFactory for BeanCreator<'_> {
    fn environment(&self) -> &Environment {
        self.environment
    }

    fn get_bean_erased(&self, id: &ComponentId) -> Result<BeanInstance> {
        match self.definitions.iter().find(|d| d.id() == *id) {
            Some(definition) => self.get_or_create(definition),
            None => Err(MultiEnvError::BeanNotFound {
                environment: self.container_name.to_string(),
                type_name: id.type_name().to_string(),
            }),
        }
    }
}
