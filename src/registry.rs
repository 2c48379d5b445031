//! Household lifecycle: one board store and one read model per household,
//! all sharing a persistence backend, a notifier and the maintenance service.

use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::HouseholdConfig;
use crate::error::RegistryError;
use crate::maintenance::{MaintenanceSchedule, MaintenanceService};
use crate::notifier::UpdateNotifier;
use crate::persistence::BoardPersistence;
use crate::read_model::HouseholdView;
use crate::rotation::RotationPlan;
use crate::store::TaskBoardStore;

/// Boards currently registered, keyed by household id.
#[derive(Default)]
pub struct BoardDirectory {
    boards: RwLock<BTreeMap<String, Arc<TaskBoardStore>>>,
}

impl BoardDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, store: Arc<TaskBoardStore>) {
        self.boards.write().insert(store.id().to_string(), store);
    }

    pub fn remove(&self, board_id: &str) -> Option<Arc<TaskBoardStore>> {
        self.boards.write().remove(board_id)
    }

    pub fn get(&self, board_id: &str) -> Option<Arc<TaskBoardStore>> {
        self.boards.read().get(board_id).cloned()
    }

    pub fn ids(&self) -> Vec<String> {
        self.boards.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.boards.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.boards.read().is_empty()
    }
}

pub struct BoardRegistry {
    persistence: Arc<dyn BoardPersistence>,
    notifier: Arc<UpdateNotifier>,
    boards: Arc<BoardDirectory>,
    views: RwLock<BTreeMap<String, Arc<HouseholdView>>>,
    maintenance: MaintenanceService,
    plan: RotationPlan,
    refresh_interval: chrono::Duration,
    membership: Mutex<()>,
}

impl BoardRegistry {
    pub fn new(
        persistence: Arc<dyn BoardPersistence>,
        plan: RotationPlan,
        refresh_interval: chrono::Duration,
        schedule: MaintenanceSchedule,
    ) -> Self {
        let boards = Arc::new(BoardDirectory::new());
        Self {
            persistence,
            notifier: Arc::new(UpdateNotifier::new()),
            maintenance: MaintenanceService::new(Arc::clone(&boards), schedule),
            boards,
            views: RwLock::new(BTreeMap::new()),
            plan,
            refresh_interval,
            membership: Mutex::new(()),
        }
    }

    pub fn notifier(&self) -> &Arc<UpdateNotifier> {
        &self.notifier
    }

    pub fn boards(&self) -> &Arc<BoardDirectory> {
        &self.boards
    }

    pub fn maintenance(&self) -> &MaintenanceService {
        &self.maintenance
    }

    /// Load the household's board and register it for maintenance.
    pub fn add_household(
        &self,
        config: &HouseholdConfig,
    ) -> Result<Arc<HouseholdView>, RegistryError> {
        let _membership = self.membership.lock();
        if self.views.read().contains_key(&config.id) {
            return Err(RegistryError::DuplicateHousehold(config.id.clone()));
        }

        self.maintenance.acquire()?;

        let store = Arc::new(TaskBoardStore::load(
            config.id.clone(),
            &config.board_defaults(),
            Arc::clone(&self.persistence),
            Arc::clone(&self.notifier),
        ));
        let view = Arc::new(HouseholdView::new(
            config,
            self.plan.clone(),
            self.refresh_interval,
            Arc::clone(&store),
        ));

        self.boards.insert(store);
        self.views
            .write()
            .insert(config.id.clone(), Arc::clone(&view));
        info!("household {} ({}) registered", config.id, config.name);
        Ok(view)
    }

    /// Swap in new name/members/chores for the household's schedule. The
    /// board itself is left alone.
    pub fn reconfigure_household(&self, config: &HouseholdConfig) -> Result<(), RegistryError> {
        let view = self
            .household(&config.id)
            .ok_or_else(|| RegistryError::UnknownHousehold(config.id.clone()))?;
        view.reconfigure(config);
        Ok(())
    }

    /// Retire the board, forget its persisted state and release maintenance.
    pub fn remove_household(&self, household_id: &str) -> Result<(), RegistryError> {
        let _membership = self.membership.lock();
        let view = self.views.write().remove(household_id);
        let store = self.boards.remove(household_id);
        if view.is_none() && store.is_none() {
            return Err(RegistryError::UnknownHousehold(household_id.to_string()));
        }

        if let Some(store) = store {
            store.retire();
        }
        self.notifier.close(household_id);
        if let Err(err) = self.persistence.remove_board(household_id) {
            warn!("cannot delete stored board {household_id}: {err}");
        }
        self.maintenance.release();
        info!("household {household_id} removed");
        Ok(())
    }

    pub fn household(&self, household_id: &str) -> Option<Arc<HouseholdView>> {
        self.views.read().get(household_id).cloned()
    }

    pub fn households(&self) -> Vec<Arc<HouseholdView>> {
        self.views.read().values().cloned().collect()
    }

    pub fn board(&self, household_id: &str) -> Option<Arc<TaskBoardStore>> {
        self.boards.get(household_id)
    }
}
