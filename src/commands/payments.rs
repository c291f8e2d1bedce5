// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::Result;
use chrono::Local;
use rusqlite::Connection;

use super::{actor, required, required_id};
use crate::engine::notifications::{NewNotification, NotificationKind};
use crate::engine::payments::{NewPayment, approve, reject};
use crate::engine::tracker::Actor;
use crate::models::{Payment, PaymentStatus};
use crate::store::{
    get_payment, insert_notification, insert_payment, load_apartments, load_payments,
    require_apartment, write_payment_decision,
};
use crate::utils::{fmt_money, maybe_print_json, parse_decimal, parse_month, pretty_table};

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let registry = load_apartments(conn)?;
            let new = NewPayment {
                payer: require_apartment(&registry, required(sub, "payer")?)?,
                payee: require_apartment(&registry, required(sub, "payee")?)?,
                amount: parse_decimal(required(sub, "amount")?)?,
                month: parse_month(required(sub, "month")?)?,
                receipt: sub.get_one::<String>("receipt").cloned(),
            };
            let p = record_payment(conn, new)?;
            println!(
                "Payment {} recorded: {} -> {} {} ({}), awaiting approval",
                p.id,
                p.payer,
                p.payee,
                fmt_money(&p.amount),
                p.month
            );
        }
        Some(("approve", sub)) => {
            let registry = load_apartments(conn)?;
            let p = decide_payment(conn, required_id(sub)?, &actor(sub, &registry)?, true)?;
            println!("Payment {} approved", p.id);
        }
        Some(("reject", sub)) => {
            let registry = load_apartments(conn)?;
            let p = decide_payment(conn, required_id(sub)?, &actor(sub, &registry)?, false)?;
            println!("Payment {} rejected", p.id);
        }
        Some(("list", sub)) => {
            let status = sub
                .get_one::<String>("status")
                .map(|s| s.parse::<PaymentStatus>())
                .transpose()?;
            let mut data = load_payments(conn)?;
            if let Some(status) = status {
                data.retain(|p| p.status == status);
            }
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
                let rows = data
                    .iter()
                    .map(|p| {
                        vec![
                            p.id.to_string(),
                            p.month.clone(),
                            p.payer.to_string(),
                            p.payee.to_string(),
                            fmt_money(&p.amount),
                            p.status.to_string(),
                            p.approved_by.clone().unwrap_or_default(),
                        ]
                    })
                    .collect();
                println!(
                    "{}",
                    pretty_table(
                        &["ID", "Month", "Payer", "Payee", "Amount", "Status", "Decided by"],
                        rows,
                    )
                );
            }
        }
        _ => {}
    }
    Ok(())
}

/// Stores a pending payment and tells the payee about it.
pub fn record_payment(conn: &Connection, new: NewPayment) -> Result<Payment> {
    let registry = load_apartments(conn)?;
    new.validate(&registry)?;
    let tx = conn.unchecked_transaction()?;
    let mut payment = Payment {
        id: 0,
        payer: new.payer,
        payee: new.payee,
        amount: new.amount,
        status: PaymentStatus::Pending,
        month: new.month,
        receipt: new.receipt,
        approved_by: None,
    };
    payment.id = insert_payment(&tx, &payment)?;
    let note = NewNotification::direct(
        NotificationKind::PaymentUpdate,
        payment.payee.clone(),
        format!("Payment from {}", payment.payer),
        format!(
            "{} reports paying you {} for {}; approve or reject payment {}",
            payment.payer,
            fmt_money(&payment.amount),
            payment.month,
            payment.id
        ),
        Local::now().naive_local(),
        None,
    );
    insert_notification(&tx, &note)?;
    tx.commit()?;
    Ok(payment)
}

/// Approves or rejects a pending payment and notifies the payer of the outcome.
pub fn decide_payment(conn: &Connection, id: i64, who: &Actor, accept: bool) -> Result<Payment> {
    let tx = conn.unchecked_transaction()?;
    let mut payment = get_payment(&tx, id)?;
    if accept {
        approve(&mut payment, who)?;
    } else {
        reject(&mut payment, who)?;
    }
    write_payment_decision(&tx, &payment)?;
    let note = NewNotification::direct(
        NotificationKind::PaymentUpdate,
        payment.payer.clone(),
        format!("Payment {} {}", payment.id, payment.status),
        format!(
            "Your payment of {} to {} was {} by {}",
            fmt_money(&payment.amount),
            payment.payee,
            payment.status,
            who
        ),
        Local::now().naive_local(),
        None,
    );
    insert_notification(&tx, &note)?;
    tx.commit()?;
    Ok(payment)
}
