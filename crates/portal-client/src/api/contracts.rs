use portal_core::{Contract, ContractOffer, Id, NewContractOffer};

use crate::{ApiError, Portal};

impl Portal {
    pub async fn list_contracts(&self) -> Result<Vec<Contract>, ApiError> {
        self.get_list("/api/contracts/").await
    }

    pub async fn get_contract(&self, id: Id) -> Result<Contract, ApiError> {
        self.get(&format!("/api/contracts/{id}/")).await
    }

    pub async fn list_contract_offers(&self, contract_id: Id) -> Result<Vec<ContractOffer>, ApiError> {
        self.get_list(&format!("/api/contracts/{contract_id}/offers/"))
            .await
    }

    pub async fn create_contract_offer(
        &self,
        contract_id: Id,
        offer: &NewContractOffer,
    ) -> Result<ContractOffer, ApiError> {
        self.post(&format!("/api/contracts/{contract_id}/offers/"), offer)
            .await
    }
}
