use ethers::types::{Address, Log, H256, U256};
use ethers::utils::keccak256;

/// Event that carries a freshly assigned game id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameIdEvent {
    GameCreated,
    ChallengeAccepted,
}

impl GameIdEvent {
    pub fn signature(self) -> &'static str {
        match self {
            GameIdEvent::GameCreated => {
                "GameCreated(uint256,address,uint256,uint8,address,uint8)"
            }
            GameIdEvent::ChallengeAccepted => "ChallengeAccepted(uint256,uint256,address)",
        }
    }

    pub fn topic(self) -> H256 {
        H256::from(keccak256(self.signature().as_bytes()))
    }

    // Position of gameId among the indexed topics (after topic0), and among
    // the data words for deployments that emit it unindexed.
    fn game_id_position(self) -> (usize, usize) {
        match self {
            GameIdEvent::GameCreated => (1, 0),
            GameIdEvent::ChallengeAccepted => (2, 1),
        }
    }
}

/// Finds the game id emitted by `contract` in a receipt's logs.
pub fn find_game_id(logs: &[Log], contract: Address, event: GameIdEvent) -> Option<u64> {
    let topic0 = event.topic();
    logs.iter()
        .filter(|log| log.address == contract)
        .filter(|log| log.topics.first() == Some(&topic0))
        .find_map(|log| game_id_from_log(log, event))
}

fn game_id_from_log(log: &Log, event: GameIdEvent) -> Option<u64> {
    let (topic_index, data_word) = event.game_id_position();
    let value = if let Some(topic) = log.topics.get(topic_index) {
        U256::from_big_endian(topic.as_bytes())
    } else {
        let start = data_word * 32;
        let word = log.data.get(start..start + 32)?;
        U256::from_big_endian(word)
    };
    if value > U256::from(u64::MAX) {
        return None;
    }
    Some(value.as_u64())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::Bytes;

    fn word(value: u64) -> H256 {
        H256::from_low_u64_be(value)
    }

    fn log(address: Address, topics: Vec<H256>, data: Vec<u8>) -> Log {
        Log {
            address,
            topics,
            data: Bytes::from(data),
            ..Default::default()
        }
    }

    #[test]
    fn game_created_id_from_indexed_topic() {
        let contract = Address::repeat_byte(0x42);
        let logs = vec![log(
            contract,
            vec![GameIdEvent::GameCreated.topic(), word(17), word(0xabc)],
            vec![0u8; 128],
        )];
        assert_eq!(find_game_id(&logs, contract, GameIdEvent::GameCreated), Some(17));
    }

    #[test]
    fn challenge_accepted_id_from_data_when_unindexed() {
        let contract = Address::repeat_byte(0x42);
        let mut data = word(3).as_bytes().to_vec();
        data.extend_from_slice(word(9).as_bytes());
        let logs = vec![log(contract, vec![GameIdEvent::ChallengeAccepted.topic()], data)];
        assert_eq!(
            find_game_id(&logs, contract, GameIdEvent::ChallengeAccepted),
            Some(9)
        );
    }

    #[test]
    fn ignores_other_contracts_and_events() {
        let contract = Address::repeat_byte(0x42);
        let logs = vec![
            log(
                Address::repeat_byte(0x01),
                vec![GameIdEvent::GameCreated.topic(), word(5)],
                Vec::new(),
            ),
            log(
                contract,
                vec![GameIdEvent::ChallengeAccepted.topic(), word(1), word(2)],
                Vec::new(),
            ),
        ];
        assert_eq!(find_game_id(&logs, contract, GameIdEvent::GameCreated), None);
    }

    #[test]
    fn short_data_yields_none() {
        let contract = Address::repeat_byte(0x42);
        let logs = vec![log(contract, vec![GameIdEvent::GameCreated.topic()], vec![1, 2])];
        assert_eq!(find_game_id(&logs, contract, GameIdEvent::GameCreated), None);
    }
}
