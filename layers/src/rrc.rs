//! Radio Resource Control (RRC) Layer Implementation
//! 
//! Implements the 5G NR RRC layer according to 3GPP TS 38.331

use crate::{LayerError, ProtocolLayer};
use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, info, warn};
use std::collections::HashMap;

/// RRC states for UE
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RrcState {
    /// RRC Idle state
    Idle,
    /// RRC Inactive state
    Inactive,
    /// RRC Connected state
    Connected,
}

/// UE context
#[derive(Debug)]
pub struct UeContext {
    /// UE identifier
    pub ue_id: u32,
    /// Current RRC state
    pub state: RrcState,
    /// Security capabilities
    pub security_capabilities: Vec<u8>,
}

/// RRC layer configuration
pub struct RrcConfig {
    /// System Information Block periodicity in ms
    pub sib_periodicity: u32,
    /// Maximum number of UE contexts
    pub max_ue_contexts: u16,
}

/// RRC layer implementation
pub struct RrcLayer {
    config: RrcConfig,
    initialized: bool,
    /// UE contexts indexed by UE ID
    ue_contexts: HashMap<u32, UeContext>,
}

impl RrcLayer {
    /// Create a new RRC layer instance
    pub fn new(config: RrcConfig) -> Self {
        Self {
            config,
            initialized: false,
            ue_contexts: HashMap::new(),
        }
    }
    
    /// Handle RRC Setup Request from UE
    async fn handle_rrc_setup_request(&mut self, ue_id: u32) -> Result<(), LayerError> {
        info!("Handling RRC Setup Request from UE {}", ue_id);
        
        // Create new UE context
        let ue_context = UeContext {
            ue_id,
            state: RrcState::Connected,
            security_capabilities: Vec::new(),
        };
        
        self.ue_contexts.insert(ue_id, ue_context);
        
        // TODO: Generate and send RRC Setup message
        
        Ok(())
    }
}

#[async_trait]
impl ProtocolLayer for RrcLayer {
    async fn initialize(&mut self) -> Result<(), LayerError> {
        info!("Initializing RRC layer");
        debug!("RRC config: sib_periodicity={}ms, max_ue_contexts={}", 
               self.config.sib_periodicity,
               self.config.max_ue_contexts);
        
        // TODO: Initialize RRC resources
        // - Setup system information broadcasting
        // - Initialize measurement configuration
        // - Setup security contexts
        
        self.initialized = true;
        info!("RRC layer initialized successfully");
        Ok(())
    }
    
    async fn process_uplink(&mut self, data: Bytes) -> Result<Bytes, LayerError> {
        if !self.initialized {
            return Err(LayerError::NotInitialized);
        }
        
        debug!("RRC processing uplink data: {} bytes", data.len());
        
        // TODO: Parse RRC message and handle based on message type
        // For now, just pass through
        
        Ok(data)
    }
    
    async fn process_downlink(&mut self, data: Bytes) -> Result<Bytes, LayerError> {
        if !self.initialized {
            return Err(LayerError::NotInitialized);
        }
        
        debug!("RRC processing downlink data: {} bytes", data.len());
        
        // TODO: Encode RRC messages for transmission
        
        Ok(data)
    }
    
    async fn shutdown(&mut self) -> Result<(), LayerError> {
        info!("Shutting down RRC layer");
        
        // Release all UE contexts
        let ue_count = self.ue_contexts.len();
        if ue_count > 0 {
            warn!("Releasing {} UE contexts", ue_count);
            self.ue_contexts.clear();
        }
        
        self.initialized = false;
        Ok(())
    }
}

/// RRC message types
#[derive(Debug, Clone, Copy)]
pub enum RrcMessageType {
    /// MIB (Master Information Block)
    Mib,
    /// SIB1 (System Information Block 1)
    Sib1,
    /// RRC Setup Request
    RrcSetupRequest,
    /// RRC Setup
    RrcSetup,
    /// RRC Setup Complete
    RrcSetupComplete,
    /// RRC Reconfiguration
    RrcReconfiguration,
    /// RRC Reconfiguration Complete
    RrcReconfigurationComplete,
}

#[cfg(test)]
mod tests {
    use super::*;
    
    #[tokio::test]
    async fn test_rrc_initialization() {
        let config = RrcConfig {
            sib_periodicity: 160,
            max_ue_contexts: 100,
        };
        
        let mut rrc = RrcLayer::new(config);
        assert!(rrc.initialize().await.is_ok());
    }
    
    #[tokio::test]
    async fn test_ue_context_creation() {
        let config = RrcConfig {
            sib_periodicity: 160,
            max_ue_contexts: 100,
        };
        
        let mut rrc = RrcLayer::new(config);
        rrc.initialize().await.unwrap();
        
        // Test UE context creation
        assert!(rrc.handle_rrc_setup_request(1001).await.is_ok());
        assert_eq!(rrc.ue_contexts.len(), 1);
        assert_eq!(rrc.ue_contexts[&1001].state, RrcState::Connected);
    }
}