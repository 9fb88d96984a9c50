//! Registration phase: slot handshake and the closed slot table.

use bytes::Bytes;
use protocol::frame::write_frame;
use protocol::packets::read_slot_index;
use protocol::Slot;
use std::collections::HashMap;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::consumer::Consumer;
use crate::error::{DistributorError, RegistrationError};

/// Fixed-size table of registered consumers, one entry per slot `1..=K`.
///
/// A slot is reserved while its handshake frame is being written, so two
/// connections claiming the same slot cannot both receive it.
#[derive(Debug)]
pub struct SlotTable<C> {
    slots: Box<[Option<Consumer<C>>]>,
    reserved: Box<[bool]>,
}

impl<C> SlotTable<C> {
    /// Empty table for `capacity` consumers.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            reserved: vec![false; capacity].into_boxed_slice(),
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of filled slots.
    pub fn filled(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_full(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    pub fn get(&self, slot: Slot) -> Option<&Consumer<C>> {
        self.index_of(slot).ok().and_then(|i| self.slots[i].as_ref())
    }

    /// Whether `slot` could be admitted right now.
    pub fn check(&self, slot: Slot) -> Result<(), RegistrationError> {
        let index = self.index_of(slot)?;
        if self.slots[index].is_some() || self.reserved[index] {
            return Err(RegistrationError::Duplicate(slot));
        }
        Ok(())
    }

    /// Hold `slot` for a connection whose handshake frame is in flight.
    pub fn reserve(&mut self, slot: Slot) -> Result<(), RegistrationError> {
        self.check(slot)?;
        let index = self.index_of(slot)?;
        self.reserved[index] = true;
        Ok(())
    }

    /// Give a reserved slot back after its handshake failed.
    pub fn release(&mut self, slot: Slot) {
        if let Ok(index) = self.index_of(slot) {
            self.reserved[index] = false;
        }
    }

    /// Admit a consumer into its slot, consuming any reservation for it.
    pub fn insert(&mut self, consumer: Consumer<C>) -> Result<(), RegistrationError> {
        let index = self.index_of(consumer.slot)?;
        if self.slots[index].is_some() {
            return Err(RegistrationError::Duplicate(consumer.slot));
        }
        self.reserved[index] = false;
        self.slots[index] = Some(consumer);
        Ok(())
    }

    /// Hand the slots over to the distributor.
    pub fn into_slots(self) -> Box<[Option<Consumer<C>>]> {
        self.slots
    }

    fn index_of(&self, slot: Slot) -> Result<usize, RegistrationError> {
        if slot == 0 || slot as usize > self.slots.len() {
            return Err(RegistrationError::OutOfRange {
                slot,
                max: self.slots.len(),
            });
        }
        Ok(slot as usize - 1)
    }
}

/// Registration timing knobs.
#[derive(Debug, Clone, Copy)]
pub struct RegistrationSettings {
    pub handshake_timeout: Duration,
    pub send_timeout: Duration,
}

/// Read the slot index a new connection opens with.
pub async fn read_handshake<C>(conn: &mut C, limit: Duration) -> Result<Slot, DistributorError>
where
    C: AsyncRead + Unpin,
{
    match timeout(limit, read_slot_index(conn)).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(DistributorError::HandshakeTimeout(limit)),
    }
}

/// Write the handshake frame (if any) to a reserved slot's connection and
/// hand the connection back.
pub async fn send_handshake<C>(
    slot: Slot,
    mut conn: C,
    handshake: Option<Bytes>,
    send_timeout: Duration,
) -> Result<C, DistributorError>
where
    C: AsyncWrite + Unpin,
{
    let Some(frame) = handshake else {
        return Ok(conn);
    };
    match timeout(send_timeout, write_frame(&mut conn, &frame)).await {
        Ok(Ok(())) => Ok(conn),
        Ok(Err(source)) => Err(DistributorError::SendFailure { slot, source }),
        Err(_) => Err(DistributorError::SendTimeout {
            slot,
            after: send_timeout,
        }),
    }
}

/// Outcome of one handshake write, keyed by the slot it was reserved for.
type Admission = (Slot, String, Result<TcpStream, DistributorError>);

/// Accept connections until every slot is filled.
///
/// Slot reads and handshake writes both run as separate tasks, so a
/// connection that stalls or dies at either point never holds up the others.
/// Rejected connections are closed and the slot they asked for stays
/// available.
pub async fn accept_registrations(
    listener: &TcpListener,
    capacity: usize,
    handshake: Option<Bytes>,
    settings: RegistrationSettings,
) -> Result<SlotTable<TcpStream>, DistributorError> {
    let mut table = SlotTable::new(capacity);
    let mut pending = JoinSet::new();
    let mut admitting: JoinSet<Admission> = JoinSet::new();
    let mut admitting_slots = HashMap::new();

    info!("Waiting for {} consumer(s)", capacity);

    while !table.is_full() {
        tokio::select! {
            accepted = listener.accept() => {
                let (mut stream, addr) = accepted?;
                if let Err(e) = stream.set_nodelay(true) {
                    debug!("Could not set TCP_NODELAY for {}: {}", addr, e);
                }
                debug!("Connection from {}", addr);
                let limit = settings.handshake_timeout;
                pending.spawn(async move {
                    let slot = read_handshake(&mut stream, limit).await;
                    (stream, addr, slot)
                });
            }
            Some(joined) = pending.join_next() => {
                let (stream, addr, slot) = match joined {
                    Ok(done) => done,
                    Err(e) => {
                        warn!("Handshake task failed: {}", e);
                        continue;
                    }
                };
                let slot = match slot {
                    Ok(slot) => slot,
                    Err(e) => {
                        warn!("Handshake from {} failed: {}", addr, e);
                        continue;
                    }
                };
                if let Err(e) = table.reserve(slot) {
                    warn!("Rejected connection from {}: {}", addr, e);
                    continue;
                }

                let frame = handshake.clone();
                let limit = settings.send_timeout;
                let task = admitting.spawn(async move {
                    let result = send_handshake(slot, stream, frame, limit).await;
                    (slot, addr.to_string(), result)
                });
                admitting_slots.insert(task.id(), slot);
            }
            Some(joined) = admitting.join_next_with_id() => {
                let (slot, peer, result) = match joined {
                    Ok((id, done)) => {
                        admitting_slots.remove(&id);
                        done
                    }
                    Err(e) => {
                        warn!("Handshake write task failed: {}", e);
                        if let Some(slot) = admitting_slots.remove(&e.id()) {
                            table.release(slot);
                        }
                        continue;
                    }
                };
                match result {
                    Ok(stream) => {
                        table.insert(Consumer::new(slot, peer.as_str(), stream))?;
                        info!(
                            "Consumer {} registered from {} ({}/{})",
                            slot,
                            peer,
                            table.filled(),
                            table.capacity()
                        );
                    }
                    Err(e) => {
                        table.release(slot);
                        warn!("Rejected connection from {}: {}", peer, e);
                    }
                }
            }
        }
    }

    // Anything still mid-handshake arrived too late.
    pending.abort_all();
    Ok(table)
}
