//! Human-readable rendering for each `NotifiableEvent` kind. The raw event
//! is always passed alongside the rendered text so richer transports can
//! render structured payloads instead.

use super::NotifiableEvent;

pub fn render(event: &NotifiableEvent) -> String {
    match event {
        NotifiableEvent::Trade { session, trade } => format!(
            "[{session}] {symbol} {side:?} {volume} @ {price} (fee {fee} {fee_currency})",
            symbol = trade.symbol,
            side = trade.side,
            volume = trade.volume,
            price = trade.price,
            fee = trade.fee,
            fee_currency = trade.fee_currency,
        ),
        NotifiableEvent::Order(order) => format!(
            "[{session}] order {order_id} {symbol} {side:?} -> {status}",
            session = order.session,
            order_id = order.order_id,
            symbol = order.symbol,
            side = order.side,
            status = order.status,
        ),
        NotifiableEvent::SubmitOrder(submit) => format!(
            "[{session}] submit {symbol} {side:?} {volume} @ {price}",
            session = submit.session,
            symbol = submit.symbol,
            side = submit.side,
            volume = submit.volume,
            price = submit.price,
        ),
        NotifiableEvent::PnLReport(report) => format!(
            "[{session}] {symbol} pnl realized={realized} unrealized={unrealized} as_of={as_of}",
            session = report.session,
            symbol = report.symbol,
            realized = report.realized,
            unrealized = report.unrealized,
            as_of = report.as_of,
        ),
    }
}
