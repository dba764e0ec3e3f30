//! Adapter factory: construction, initialization with timeout and retry,
//! on-demand recovery, and the periodic health check loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use futures::future;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::adapters::sms::SmsProviderRegistry;
use crate::adapters::{ChannelAdapter, SmsAdapter, WebhookAdapter};
use crate::config::{ChannelSettings, FactorySettings};
use crate::error::{NotifyError, NotifyResult};
use crate::models::NotificationChannel;

use super::registry::{AdapterEntry, AdapterRegistry, ChannelState};

type AdapterBuilder =
    Box<dyn Fn(NotificationChannel) -> NotifyResult<Arc<dyn ChannelAdapter>> + Send + Sync>;

type RecoveryLocks = Arc<DashMap<NotificationChannel, Arc<Mutex<()>>>>;

/// Owns the configured channels: builds adapters, drives initialization,
/// hands ready adapters to callers, and recovers unhealthy ones.
///
/// Per-channel state machine:
/// `Initializing -> Ready -> (Degraded -> Ready | Failed)`.
///
/// Must be created within a tokio runtime; the registry owner task is
/// spawned at construction.
pub struct AdapterFactory {
    settings: FactorySettings,
    registry: AdapterRegistry,
    builder: AdapterBuilder,
    initializing: AtomicBool,
    health_task: Mutex<Option<JoinHandle<()>>>,
    recovery_locks: RecoveryLocks,
}

impl AdapterFactory {
    /// Factory with the built-in SMS and webhook adapters.
    pub fn new(settings: FactorySettings) -> Self {
        let providers = Arc::new(SmsProviderRegistry::with_builtins());
        Self::with_adapter_builder(
            settings,
            Box::new(move |channel| match channel {
                NotificationChannel::Sms => {
                    Ok(Arc::new(SmsAdapter::with_registry(providers.clone())) as Arc<dyn ChannelAdapter>)
                }
                NotificationChannel::Webhook => {
                    Ok(Arc::new(WebhookAdapter::new()) as Arc<dyn ChannelAdapter>)
                }
                other => Err(NotifyError::UnsupportedChannel { channel: other }),
            }),
        )
    }

    /// Factory with a caller-supplied adapter constructor, the extension
    /// point for channels without a built-in adapter (email, push).
    pub fn with_adapter_builder(settings: FactorySettings, builder: AdapterBuilder) -> Self {
        Self {
            settings,
            registry: AdapterRegistry::spawn(),
            builder,
            initializing: AtomicBool::new(false),
            health_task: Mutex::new(None),
            recovery_locks: Arc::new(DashMap::new()),
        }
    }

    /// Initializes every enabled channel concurrently.
    ///
    /// A single channel failing is logged and excluded from the ready set.
    /// The call only fails outright when configuration is invalid, when a
    /// previous `initialize` is still running, or when zero channels come
    /// up: a notification subsystem with no working channel is a fatal
    /// configuration error.
    pub async fn initialize(&self) -> NotifyResult<()> {
        if self.initializing.swap(true, Ordering::SeqCst) {
            return Err(NotifyError::AlreadyInitializing);
        }
        let result = self.initialize_all().await;
        self.initializing.store(false, Ordering::SeqCst);
        result
    }

    async fn initialize_all(&self) -> NotifyResult<()> {
        self.settings
            .validate()
            .map_err(|e| NotifyError::validation("factory", e.to_string()))?;

        let attempts = self.settings.enabled_channels.iter().map(|&channel| async move {
            (channel, self.initialize_channel(channel).await)
        });

        let mut ready = 0usize;
        for (channel, outcome) in future::join_all(attempts).await {
            match outcome {
                Ok(()) => {
                    ready += 1;
                    tracing::info!(%channel, "notification channel initialized");
                }
                Err(e) => {
                    tracing::error!(%channel, error = %e, "notification channel failed to initialize");
                }
            }
        }

        if ready == 0 {
            return Err(NotifyError::NoChannelsReady);
        }

        self.start_health_loop().await;
        Ok(())
    }

    /// Brings up one channel: builds the adapter and initializes it under
    /// the configured timeout, retrying with exponential backoff.
    pub async fn initialize_channel(&self, channel: NotificationChannel) -> NotifyResult<()> {
        let channel_settings = self
            .settings
            .channel_settings(channel)
            .ok_or(NotifyError::ChannelConfigMissing { channel })?;

        let adapter = (self.builder)(channel)?;
        self.registry
            .insert(
                channel,
                AdapterEntry {
                    adapter: adapter.clone(),
                    state: ChannelState::Initializing,
                },
            )
            .await;

        match self
            .initialize_with_retries(channel, adapter.as_ref(), channel_settings)
            .await
        {
            Ok(()) => {
                self.registry.set_state(channel, ChannelState::Ready).await;
                Ok(())
            }
            Err(e) => {
                self.registry.set_state(channel, ChannelState::Failed).await;
                Err(e)
            }
        }
    }

    async fn initialize_with_retries(
        &self,
        channel: NotificationChannel,
        adapter: &dyn ChannelAdapter,
        channel_settings: &ChannelSettings,
    ) -> NotifyResult<()> {
        let max_retries = self.settings.initialization_max_retries;
        let mut last_error = None;

        for attempt in 0..=max_retries {
            if attempt > 0 {
                let delay = Duration::from_millis(
                    self.settings
                        .initialization_retry_base_ms
                        .saturating_mul(1u64 << (attempt - 1).min(16)),
                );
                tokio::time::sleep(delay).await;
            }

            match Self::attempt_initialize(
                channel,
                adapter,
                channel_settings,
                self.settings.initialization_timeout_ms,
            )
            .await
            {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!(
                        %channel,
                        attempt,
                        error = %e,
                        "adapter initialization attempt failed"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(NotifyError::ChannelNotReady { channel }))
    }

    /// One initialization attempt raced against the configured timeout.
    /// When the timer wins, the initialization future is dropped; the
    /// adapter only becomes ready from a completed initialize, so the
    /// loser cannot corrupt state.
    async fn attempt_initialize(
        channel: NotificationChannel,
        adapter: &dyn ChannelAdapter,
        channel_settings: &ChannelSettings,
        timeout_ms: u64,
    ) -> NotifyResult<()> {
        match tokio::time::timeout(
            Duration::from_millis(timeout_ms),
            adapter.initialize(channel_settings),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(NotifyError::InitializationTimeout {
                channel,
                timeout_ms,
            }),
        }
    }

    /// Returns the adapter for a channel if it is ready.
    ///
    /// A not-ready adapter gets exactly one synchronous re-initialization
    /// when auto-recovery is enabled; otherwise the caller sees
    /// [`NotifyError::ChannelNotReady`] immediately.
    pub async fn get_adapter(
        &self,
        channel: NotificationChannel,
    ) -> NotifyResult<Arc<dyn ChannelAdapter>> {
        let entry = self
            .registry
            .get(channel)
            .await
            .ok_or(NotifyError::ChannelNotReady { channel })?;

        if entry.adapter.is_ready() {
            return Ok(entry.adapter);
        }

        if !self.settings.auto_recovery {
            return Err(NotifyError::ChannelNotReady { channel });
        }

        Self::recover(
            &self.registry,
            &self.settings,
            &self.recovery_locks,
            channel,
            entry.adapter.clone(),
        )
        .await?;

        Ok(entry.adapter)
    }

    /// Whether a channel is registered and ready.
    pub async fn is_channel_available(&self, channel: NotificationChannel) -> bool {
        match self.registry.get(channel).await {
            Some(entry) => entry.adapter.is_ready(),
            None => false,
        }
    }

    /// Channels currently ready for delivery, as a snapshot.
    pub async fn available_channels(&self) -> Vec<NotificationChannel> {
        self.registry
            .snapshot()
            .await
            .into_iter()
            .filter(|(_, entry)| entry.adapter.is_ready())
            .map(|(channel, _)| channel)
            .collect()
    }

    /// Lifecycle state of a registered channel.
    pub async fn channel_state(&self, channel: NotificationChannel) -> Option<ChannelState> {
        self.registry.get(channel).await.map(|entry| entry.state)
    }

    /// Re-initializes a not-ready adapter in place, one attempt under the
    /// initialization timeout. Recovery of a channel is mutually exclusive
    /// across callers and the health loop.
    async fn recover(
        registry: &AdapterRegistry,
        settings: &FactorySettings,
        locks: &RecoveryLocks,
        channel: NotificationChannel,
        adapter: Arc<dyn ChannelAdapter>,
    ) -> NotifyResult<()> {
        let lock = {
            locks
                .entry(channel)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        let _guard = lock.lock().await;

        // Another caller may have recovered the channel while we waited.
        if adapter.is_ready() {
            registry.set_state(channel, ChannelState::Ready).await;
            return Ok(());
        }

        registry.set_state(channel, ChannelState::Degraded).await;
        let channel_settings = settings
            .channel_settings(channel)
            .ok_or(NotifyError::ChannelConfigMissing { channel })?;

        match Self::attempt_initialize(
            channel,
            adapter.as_ref(),
            channel_settings,
            settings.initialization_timeout_ms,
        )
        .await
        {
            Ok(()) => {
                registry.set_state(channel, ChannelState::Ready).await;
                tracing::info!(%channel, "notification channel recovered");
                Ok(())
            }
            Err(e) => {
                registry.set_state(channel, ChannelState::Failed).await;
                tracing::error!(%channel, error = %e, "notification channel recovery failed");
                Err(e)
            }
        }
    }

    async fn start_health_loop(&self) {
        if !self.settings.auto_recovery {
            return;
        }
        let Some(interval_ms) = self.settings.health_check_interval_ms else {
            return;
        };

        let mut guard = self.health_task.lock().await;
        if guard.is_some() {
            return;
        }

        let registry = self.registry.clone();
        let settings = self.settings.clone();
        let locks = self.recovery_locks.clone();

        tracing::info!(interval_ms, "starting notification health check loop");
        *guard = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // interval fires immediately; the first health check should
            // wait a full period.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                Self::health_tick(&registry, &settings, &locks).await;
            }
        }));
    }

    /// One health pass: probe every adapter concurrently so a slow or
    /// failing one cannot delay checks of its siblings.
    async fn health_tick(
        registry: &AdapterRegistry,
        settings: &FactorySettings,
        locks: &RecoveryLocks,
    ) {
        let snapshot = registry.snapshot().await;

        let checks = snapshot.into_iter().map(|(channel, entry)| async move {
            if entry.adapter.is_ready() {
                if entry.state != ChannelState::Ready {
                    registry.set_state(channel, ChannelState::Ready).await;
                }
                return;
            }

            tracing::warn!(%channel, "health check found adapter not ready");
            // recover() logs its own outcome; nothing further to do here.
            let _ = Self::recover(registry, settings, locks, channel, entry.adapter).await;
        });

        future::join_all(checks).await;
    }

    /// Stops the health loop and releases all adapter references.
    /// Idempotent.
    pub async fn dispose(&self) {
        if let Some(handle) = self.health_task.lock().await.take() {
            handle.abort();
        }
        self.registry.clear().await;
        tracing::info!("notification adapter factory disposed");
    }
}
